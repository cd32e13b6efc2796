//! Channel tags and ordered channel layouts.

use std::fmt;

/// Semantic speaker position of one interleaved channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Front left.
    FL,
    /// Front right.
    FR,
    /// Front center.
    FC,
    /// Low frequency effects.
    LFE,
    /// Back left.
    BL,
    /// Back right.
    BR,
    /// Side left.
    SL,
    /// Side right.
    SR,
    /// Front left of center.
    FLOC,
    /// Front right of center.
    FROC,
    /// Back center.
    BC,
    /// Top front left.
    TFL,
    /// Top front right.
    TFR,
    /// Top front center.
    TFC,
    /// Top center.
    TC,
    /// Top back left.
    TBL,
    /// Top back right.
    TBR,
    /// Top back center.
    TBC,
    /// Back left of center.
    BLOC,
    /// Back right of center.
    BROC,
    /// Encoded bitstream carrier channel.
    RAW,
    /// Unassigned padding channel 1.
    Unknown1,
    /// Unassigned padding channel 2.
    Unknown2,
    /// Unassigned padding channel 3.
    Unknown3,
    /// Unassigned padding channel 4.
    Unknown4,
    /// Unassigned padding channel 5.
    Unknown5,
    /// Unassigned padding channel 6.
    Unknown6,
    /// Unassigned padding channel 7.
    Unknown7,
    /// Unassigned padding channel 8.
    Unknown8,
}

impl Channel {
    /// Returns `true` for the `UnknownN` padding tags.
    pub fn is_unknown(self) -> bool {
        matches!(
            self,
            Self::Unknown1
                | Self::Unknown2
                | Self::Unknown3
                | Self::Unknown4
                | Self::Unknown5
                | Self::Unknown6
                | Self::Unknown7
                | Self::Unknown8
        )
    }

    /// Short display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::FL => "FL",
            Self::FR => "FR",
            Self::FC => "FC",
            Self::LFE => "LFE",
            Self::BL => "BL",
            Self::BR => "BR",
            Self::SL => "SL",
            Self::SR => "SR",
            Self::FLOC => "FLOC",
            Self::FROC => "FROC",
            Self::BC => "BC",
            Self::TFL => "TFL",
            Self::TFR => "TFR",
            Self::TFC => "TFC",
            Self::TC => "TC",
            Self::TBL => "TBL",
            Self::TBR => "TBR",
            Self::TBC => "TBC",
            Self::BLOC => "BLOC",
            Self::BROC => "BROC",
            Self::RAW => "RAW",
            Self::Unknown1 => "UNKNOWN1",
            Self::Unknown2 => "UNKNOWN2",
            Self::Unknown3 => "UNKNOWN3",
            Self::Unknown4 => "UNKNOWN4",
            Self::Unknown5 => "UNKNOWN5",
            Self::Unknown6 => "UNKNOWN6",
            Self::Unknown7 => "UNKNOWN7",
            Self::Unknown8 => "UNKNOWN8",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered sequence of channel tags describing interleaved frame layout.
///
/// The position of a tag is the position of its sample inside each frame.
///
/// ```
/// use stream_playback::{Channel, ChannelLayout};
///
/// let layout = ChannelLayout::surround51();
/// assert_eq!(layout.count(), 6);
/// assert!(layout.has_channel(Channel::LFE));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    channels: Vec<Channel>,
}

impl ChannelLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single front-center channel.
    pub fn mono() -> Self {
        Self::from(vec![Channel::FC])
    }

    /// FL, FR.
    pub fn stereo() -> Self {
        Self::from(vec![Channel::FL, Channel::FR])
    }

    /// FL, FR, FC, LFE, BL, BR.
    pub fn surround51() -> Self {
        Self::from(vec![
            Channel::FL,
            Channel::FR,
            Channel::FC,
            Channel::LFE,
            Channel::BL,
            Channel::BR,
        ])
    }

    /// FL, FR, FC, LFE, BL, BR, SL, SR.
    pub fn surround71() -> Self {
        Self::from(vec![
            Channel::FL,
            Channel::FR,
            Channel::FC,
            Channel::LFE,
            Channel::BL,
            Channel::BR,
            Channel::SL,
            Channel::SR,
        ])
    }

    /// `count` bitstream carrier channels.
    pub fn raw(count: usize) -> Self {
        Self::from(vec![Channel::RAW; count])
    }

    /// Number of channels.
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the layout has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The channel tags in frame order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channel at frame position `index`.
    pub fn get(&self, index: usize) -> Option<Channel> {
        self.channels.get(index).copied()
    }

    /// Frame position of `channel`, if present.
    pub fn position(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }

    /// Appends a channel at the end of the frame.
    pub fn push(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    /// Iterates over the channel tags in frame order.
    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.iter().copied()
    }

    /// Returns `true` if `channel` occurs anywhere in the layout.
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    /// Returns `true` if every channel of `other` occurs in `self`.
    pub fn contains_channels(&self, other: &ChannelLayout) -> bool {
        other.iter().all(|c| self.has_channel(c))
    }

    /// Returns `true` if both layouts hold the same channel set, in any order.
    pub fn is_set_equal(&self, other: &ChannelLayout) -> bool {
        self.contains_channels(other) && other.contains_channels(self)
    }

    /// Replaces every occurrence of `from` with `to`.
    pub fn replace_channel(&mut self, from: Channel, to: Channel) {
        for c in &mut self.channels {
            if *c == from {
                *c = to;
            }
        }
    }

    /// Appends channels of `other` that are not yet present.
    pub fn add_missing_channels(&mut self, other: &ChannelLayout) {
        for c in other.iter() {
            if !self.has_channel(c) {
                self.channels.push(c);
            }
        }
    }

    /// Restricts the layout to channels that `available` can reproduce.
    ///
    /// Side and back pairs stand in for each other when only one of them
    /// exists on the output.
    pub fn resolve_channels(&mut self, available: &ChannelLayout) {
        let swap_to_back = !available.has_channel(Channel::SL)
            && available.has_channel(Channel::BL)
            && !self.has_channel(Channel::BL);
        let swap_to_side = !available.has_channel(Channel::BL)
            && available.has_channel(Channel::SL)
            && !self.has_channel(Channel::SL);

        let mut resolved = Vec::with_capacity(self.channels.len());
        for &c in &self.channels {
            let c = match c {
                Channel::SL if swap_to_back => Channel::BL,
                Channel::SR if swap_to_back => Channel::BR,
                Channel::BL if swap_to_side => Channel::SL,
                Channel::BR if swap_to_side => Channel::SR,
                other => other,
            };
            if available.has_channel(c) && !resolved.contains(&c) {
                resolved.push(c);
            }
        }
        self.channels = resolved;
    }

    /// A layout is usable when at least one channel is not padding.
    pub fn is_layout_valid(&self) -> bool {
        self.channels.iter().any(|c| !c.is_unknown())
    }

    /// Returns `true` if a non-padding tag appears more than once.
    pub fn has_duplicates(&self) -> bool {
        self.channels.iter().enumerate().any(|(i, c)| {
            !c.is_unknown() && *c != Channel::RAW && self.channels[i + 1..].contains(c)
        })
    }

    /// Symmetric rewrite swapping back and side speakers.
    ///
    /// CEA-861-D (HDMI 1.x) describes 7.1 as back + back-of-center rather
    /// than side + back, so equivalent host maps can carry either naming.
    /// Returns `None` for asymmetric layouts or when no rewrite applies.
    pub fn alternate_form(&self) -> Option<ChannelLayout> {
        let has = |c| self.has_channel(c);
        let symmetric = has(Channel::BL) == has(Channel::BR)
            && has(Channel::SL) == has(Channel::SR)
            && has(Channel::BLOC) == has(Channel::BROC);
        if !symmetric {
            return None;
        }

        let mut alt = self.clone();
        if has(Channel::SL) && has(Channel::BL) && !has(Channel::BLOC) {
            alt.replace_channel(Channel::BL, Channel::BLOC);
            alt.replace_channel(Channel::BR, Channel::BROC);
            alt.replace_channel(Channel::SL, Channel::BL);
            alt.replace_channel(Channel::SR, Channel::BR);
        } else if !has(Channel::SL) && has(Channel::BL) && has(Channel::BLOC) {
            alt.replace_channel(Channel::BL, Channel::SL);
            alt.replace_channel(Channel::BR, Channel::SR);
            alt.replace_channel(Channel::BLOC, Channel::BL);
            alt.replace_channel(Channel::BROC, Channel::BR);
        } else if has(Channel::SL) && !has(Channel::BL) {
            alt.replace_channel(Channel::SL, Channel::BL);
            alt.replace_channel(Channel::SR, Channel::BR);
        } else if !has(Channel::SL) && has(Channel::BL) {
            alt.replace_channel(Channel::BL, Channel::SL);
            alt.replace_channel(Channel::BR, Channel::SR);
        } else {
            return None;
        }
        Some(alt)
    }

    /// Scores how well `candidate` reproduces this layout.
    ///
    /// Each requested channel missing from the candidate costs 8, each extra
    /// non-padding channel costs 1. A perfect match scores 0.
    pub fn match_score(&self, candidate: &ChannelLayout) -> i32 {
        let missing = self.iter().filter(|&c| !candidate.has_channel(c)).count() as i32;
        let extra = candidate
            .iter()
            .filter(|&c| !c.is_unknown() && !self.has_channel(c))
            .count() as i32;
        -8 * missing - extra
    }

    /// Index and score of the best candidate; ties go to the lowest index.
    pub fn best_match(&self, candidates: &[ChannelLayout]) -> Option<(usize, i32)> {
        let mut best: Option<(usize, i32)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = self.match_score(candidate);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }
        best
    }
}

impl From<Vec<Channel>> for ChannelLayout {
    fn from(channels: Vec<Channel>) -> Self {
        Self { channels }
    }
}

impl From<&[Channel]> for ChannelLayout {
    fn from(channels: &[Channel]) -> Self {
        Self {
            channels: channels.to_vec(),
        }
    }
}

impl FromIterator<Channel> for ChannelLayout {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, c) in self.channels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Channel::*;

    fn layout(channels: &[Channel]) -> ChannelLayout {
        ChannelLayout::from(channels)
    }

    #[test]
    fn test_contains_and_set_equal() {
        let a = layout(&[FL, FR, FC]);
        let b = layout(&[FC, FL, FR]);
        assert!(a.contains_channels(&layout(&[FL])));
        assert!(a.is_set_equal(&b));
        assert!(!a.is_set_equal(&layout(&[FL, FR])));
    }

    #[test]
    fn test_alternate_form_back_to_side() {
        let alt = ChannelLayout::surround51().alternate_form().unwrap();
        assert_eq!(alt, layout(&[FL, FR, FC, LFE, SL, SR]));
    }

    #[test]
    fn test_alternate_form_side_to_back() {
        let alt = layout(&[FL, FR, SL, SR]).alternate_form().unwrap();
        assert_eq!(alt, layout(&[FL, FR, BL, BR]));
    }

    #[test]
    fn test_alternate_form_71_uses_back_of_center() {
        let alt = ChannelLayout::surround71().alternate_form().unwrap();
        assert_eq!(alt, layout(&[FL, FR, FC, LFE, BLOC, BROC, BL, BR]));
        // and back again
        assert_eq!(alt.alternate_form().unwrap(), ChannelLayout::surround71());
    }

    #[test]
    fn test_alternate_form_asymmetric_is_none() {
        assert!(layout(&[FL, FR, BL]).alternate_form().is_none());
        assert!(ChannelLayout::stereo().alternate_form().is_none());
    }

    #[test]
    fn test_best_match_prefers_containment() {
        let wanted = layout(&[FL, FR, FC]);
        let candidates = vec![
            layout(&[FL, FR]),
            layout(&[FL, FR, FC, LFE]),
            layout(&[FL, FR, FC]),
        ];
        assert_eq!(wanted.best_match(&candidates), Some((2, 0)));
    }

    #[test]
    fn test_best_match_ties_on_lowest_index() {
        let wanted = ChannelLayout::stereo();
        let candidates = vec![layout(&[FL, FR, FC]), layout(&[FL, FR, LFE])];
        assert_eq!(wanted.best_match(&candidates), Some((0, -1)));
        assert_eq!(wanted.best_match(&[]), None);
    }

    #[test]
    fn test_resolve_channels_maps_side_to_back() {
        let mut wanted = layout(&[FL, FR, FC, SL, SR]);
        wanted.resolve_channels(&layout(&[FL, FR, BL, BR, FC, LFE]));
        assert_eq!(wanted, layout(&[FL, FR, FC, BL, BR]));
    }

    #[test]
    fn test_layout_validity_and_duplicates() {
        assert!(!layout(&[Unknown1, Unknown2]).is_layout_valid());
        assert!(layout(&[Unknown1, FL]).is_layout_valid());
        assert!(layout(&[FL, FL]).has_duplicates());
        assert!(!layout(&[FL, Unknown1, Unknown1]).has_duplicates());
        assert!(!ChannelLayout::raw(2).has_duplicates());
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelLayout::stereo().to_string(), "[FL,FR]");
    }
}
