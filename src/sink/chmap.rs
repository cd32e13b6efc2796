//! Translation between host channel maps and channel layouts.

use tracing::debug;

use crate::format::{Channel, ChannelLayout};
use crate::host::{ChmapPosition, ChmapQuery, ChmapType};

/// Channel order assumed for devices that cannot report a channel map.
pub(crate) const LEGACY_MAP: [Channel; 16] = [
    Channel::FL,
    Channel::FR,
    Channel::BL,
    Channel::BR,
    Channel::FC,
    Channel::LFE,
    Channel::SL,
    Channel::SR,
    Channel::Unknown1,
    Channel::Unknown2,
    Channel::Unknown3,
    Channel::Unknown4,
    Channel::Unknown5,
    Channel::Unknown6,
    Channel::Unknown7,
    Channel::Unknown8,
];

/// Legacy order used when the stream has side channels but no back pair,
/// so a 5.1(side) stream lands on the first six outputs.
pub(crate) const LEGACY_MAP_WIDE: [Channel; 16] = [
    Channel::FL,
    Channel::FR,
    Channel::SL,
    Channel::SR,
    Channel::FC,
    Channel::LFE,
    Channel::BL,
    Channel::BR,
    Channel::Unknown1,
    Channel::Unknown2,
    Channel::Unknown3,
    Channel::Unknown4,
    Channel::Unknown5,
    Channel::Unknown6,
    Channel::Unknown7,
    Channel::Unknown8,
];

pub(crate) fn channel_from_position(position: ChmapPosition) -> Channel {
    match position {
        ChmapPosition::FL => Channel::FL,
        ChmapPosition::FR => Channel::FR,
        ChmapPosition::FC => Channel::FC,
        ChmapPosition::LFE => Channel::LFE,
        ChmapPosition::SL => Channel::SL,
        ChmapPosition::SR => Channel::SR,
        ChmapPosition::RL => Channel::BL,
        ChmapPosition::RR => Channel::BR,
        ChmapPosition::FLC => Channel::FLOC,
        ChmapPosition::FRC => Channel::FROC,
        ChmapPosition::RC => Channel::BC,
        ChmapPosition::TFL => Channel::TFL,
        ChmapPosition::TFR => Channel::TFR,
        ChmapPosition::TFC => Channel::TFC,
        ChmapPosition::TC => Channel::TC,
        ChmapPosition::TRL => Channel::TBL,
        ChmapPosition::TRR => Channel::TBR,
        ChmapPosition::TRC => Channel::TBC,
        ChmapPosition::RLC => Channel::BLOC,
        ChmapPosition::RRC => Channel::BROC,
        _ => Channel::Unknown1,
    }
}

pub(crate) fn position_from_channel(channel: Channel) -> ChmapPosition {
    match channel {
        Channel::FL => ChmapPosition::FL,
        Channel::FR => ChmapPosition::FR,
        Channel::FC => ChmapPosition::FC,
        Channel::LFE => ChmapPosition::LFE,
        Channel::SL => ChmapPosition::SL,
        Channel::SR => ChmapPosition::SR,
        Channel::BL => ChmapPosition::RL,
        Channel::BR => ChmapPosition::RR,
        Channel::FLOC => ChmapPosition::FLC,
        Channel::FROC => ChmapPosition::FRC,
        Channel::BC => ChmapPosition::RC,
        Channel::TFL => ChmapPosition::TFL,
        Channel::TFR => ChmapPosition::TFR,
        Channel::TFC => ChmapPosition::TFC,
        Channel::TC => ChmapPosition::TC,
        Channel::TBL => ChmapPosition::TRL,
        Channel::TBR => ChmapPosition::TRR,
        Channel::TBC => ChmapPosition::TRC,
        Channel::BLOC => ChmapPosition::RLC,
        Channel::BROC => ChmapPosition::RRC,
        _ => ChmapPosition::Unknown,
    }
}

pub(crate) fn layout_from_positions(positions: &[ChmapPosition]) -> ChannelLayout {
    positions.iter().map(|&p| channel_from_position(p)).collect()
}

pub(crate) fn positions_from_layout(layout: &ChannelLayout) -> Vec<ChmapPosition> {
    layout.iter().map(position_from_channel).collect()
}

/// Legacy order matching `layout`'s surround flavour.
pub(crate) fn legacy_map_for(layout: &ChannelLayout) -> &'static [Channel; 16] {
    if layout.has_channel(Channel::SL) && !layout.has_channel(Channel::BL) {
        &LEGACY_MAP_WIDE
    } else {
        &LEGACY_MAP
    }
}

/// Channels needed to carry `layout` in legacy order, clamped to the device
/// range.
pub(crate) fn legacy_channel_count(layout: &ChannelLayout, min: u32, max: u32) -> u32 {
    let map = legacy_map_for(layout);
    let needed = map[..8]
        .iter()
        .enumerate()
        .filter(|(_, c)| layout.has_channel(**c))
        .map(|(i, _)| i as u32 + 1)
        .max()
        .unwrap_or(0);
    needed.clamp(min, max.max(min))
}

/// The first `channels` entries of the legacy order for `layout`.
pub(crate) fn legacy_layout(layout: &ChannelLayout, channels: usize) -> ChannelLayout {
    legacy_map_for(layout)
        .iter()
        .take(channels)
        .copied()
        .collect()
}

/// Union of every channel the advertised maps can carry.
pub(crate) fn chmap_union(maps: &[ChmapQuery]) -> ChannelLayout {
    let mut union = ChannelLayout::new();
    for query in maps {
        union.add_missing_channels(&layout_from_positions(&query.positions));
    }
    union
}

/// Picks the device channel map for `requested`.
///
/// An exact set match wins, for the request or its alternate form. A `Var`
/// map takes the caller's order; any other type keeps the device order.
/// Otherwise the best scoring map is used, trying the alternate form when
/// the request alone is lossy.
pub(crate) fn select_chmap(
    maps: &[ChmapQuery],
    requested: &ChannelLayout,
) -> Option<Vec<ChmapPosition>> {
    let alternate = requested.alternate_form();

    for query in maps {
        if query.positions.len() != requested.count() {
            continue;
        }
        let offered = layout_from_positions(&query.positions);
        let candidate = if offered.is_set_equal(requested) {
            requested
        } else if let Some(alt) = alternate.as_ref().filter(|alt| offered.is_set_equal(alt)) {
            alt
        } else {
            continue;
        };
        debug!(map = %offered, "Exact channel map match");
        return Some(match query.map_type {
            ChmapType::Var => positions_from_layout(candidate),
            _ => query.positions.clone(),
        });
    }

    let offered: Vec<ChannelLayout> = maps
        .iter()
        .map(|q| layout_from_positions(&q.positions))
        .collect();
    let (mut best, score) = requested.best_match(&offered)?;
    if score < 0 {
        if let Some((alt_best, alt_score)) = alternate.and_then(|alt| alt.best_match(&offered)) {
            if alt_score > score {
                best = alt_best;
            }
        }
    }
    debug!(map = %offered[best], score, "Best channel map match");
    Some(maps[best].positions.clone())
}

/// Layout the pipeline must deliver, given the map the device reports.
///
/// When the device map misses requested channels but its alternate form
/// reproduces them better, the alternate naming is presented instead; the
/// speakers are the same. Short maps are padded with `Unknown1`.
pub(crate) fn output_layout(
    device_map: Option<&[ChmapPosition]>,
    requested: &ChannelLayout,
    channels: usize,
) -> ChannelLayout {
    let mut layout = match device_map {
        Some(positions) => {
            let info = layout_from_positions(positions);
            if info.contains_channels(requested) {
                info
            } else {
                match info.alternate_form() {
                    Some(alt) => {
                        let candidates = [info, alt];
                        match requested.best_match(&candidates) {
                            Some((1, _)) => {
                                let [_, alt] = candidates;
                                alt
                            }
                            _ => {
                                let [info, _] = candidates;
                                info
                            }
                        }
                    }
                    None => info,
                }
            }
        }
        None => legacy_layout(requested, channels),
    };
    while layout.count() < channels {
        layout.push(Channel::Unknown1);
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(channels: &[Channel]) -> ChannelLayout {
        ChannelLayout::from(channels)
    }

    #[test]
    fn test_position_mapping_round_trip() {
        for channel in [
            Channel::FL,
            Channel::BL,
            Channel::FLOC,
            Channel::BC,
            Channel::TBL,
            Channel::BROC,
        ] {
            assert_eq!(channel_from_position(position_from_channel(channel)), channel);
        }
        assert_eq!(channel_from_position(ChmapPosition::Mono), Channel::Unknown1);
        assert_eq!(position_from_channel(Channel::RAW), ChmapPosition::Unknown);
    }

    #[test]
    fn test_legacy_channel_count() {
        assert_eq!(legacy_channel_count(&ChannelLayout::stereo(), 1, 8), 2);
        assert_eq!(legacy_channel_count(&ChannelLayout::surround51(), 1, 8), 6);
        // FC sits at index 4
        assert_eq!(legacy_channel_count(&ChannelLayout::mono(), 1, 8), 5);
        assert_eq!(legacy_channel_count(&ChannelLayout::surround71(), 2, 6), 6);
    }

    #[test]
    fn test_legacy_wide_variant() {
        let side = layout(&[
            Channel::FL,
            Channel::FR,
            Channel::FC,
            Channel::LFE,
            Channel::SL,
            Channel::SR,
        ]);
        assert_eq!(legacy_channel_count(&side, 1, 8), 6);
        assert_eq!(
            legacy_layout(&side, 4),
            layout(&[Channel::FL, Channel::FR, Channel::SL, Channel::SR])
        );
    }

    #[test]
    fn test_select_var_uses_caller_order() {
        let maps = vec![ChmapQuery::var(&[ChmapPosition::FL, ChmapPosition::FR])];
        let requested = layout(&[Channel::FR, Channel::FL]);
        assert_eq!(
            select_chmap(&maps, &requested),
            Some(vec![ChmapPosition::FR, ChmapPosition::FL])
        );
    }

    #[test]
    fn test_select_fixed_keeps_device_order() {
        let maps = vec![ChmapQuery::fixed(&[ChmapPosition::FL, ChmapPosition::FR])];
        let requested = layout(&[Channel::FR, Channel::FL]);
        assert_eq!(
            select_chmap(&maps, &requested),
            Some(vec![ChmapPosition::FL, ChmapPosition::FR])
        );
    }

    #[test]
    fn test_select_alternate_form() {
        let maps = vec![ChmapQuery::var(&[
            ChmapPosition::FL,
            ChmapPosition::FR,
            ChmapPosition::FC,
            ChmapPosition::LFE,
            ChmapPosition::SL,
            ChmapPosition::SR,
        ])];
        let selected = select_chmap(&maps, &ChannelLayout::surround51()).unwrap();
        assert_eq!(
            selected,
            vec![
                ChmapPosition::FL,
                ChmapPosition::FR,
                ChmapPosition::FC,
                ChmapPosition::LFE,
                ChmapPosition::SL,
                ChmapPosition::SR,
            ]
        );
    }

    #[test]
    fn test_select_best_match_any_index() {
        let maps = vec![
            ChmapQuery::fixed(&[ChmapPosition::FL, ChmapPosition::FR]),
            ChmapQuery::fixed(&[
                ChmapPosition::FL,
                ChmapPosition::FR,
                ChmapPosition::RL,
                ChmapPosition::RR,
            ]),
        ];
        // 3.0 has no exact map; stereo misses FC and BL/BR are extra
        let requested = layout(&[Channel::FL, Channel::FR, Channel::FC]);
        let selected = select_chmap(&maps, &requested).unwrap();
        assert_eq!(selected.len(), 2);

        // only a wider map is offered
        let selected = select_chmap(&maps[1..], &ChannelLayout::stereo()).unwrap();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_select_empty_maps() {
        assert_eq!(select_chmap(&[], &ChannelLayout::stereo()), None);
    }

    #[test]
    fn test_output_layout_fakes_alternate() {
        let device = [
            ChmapPosition::FL,
            ChmapPosition::FR,
            ChmapPosition::FC,
            ChmapPosition::LFE,
            ChmapPosition::SL,
            ChmapPosition::SR,
        ];
        let out = output_layout(Some(&device), &ChannelLayout::surround51(), 6);
        assert_eq!(out, ChannelLayout::surround51());
    }

    #[test]
    fn test_output_layout_pads_unknown() {
        let out = output_layout(
            Some(&[ChmapPosition::FL, ChmapPosition::FR]),
            &ChannelLayout::stereo(),
            4,
        );
        assert_eq!(
            out,
            layout(&[Channel::FL, Channel::FR, Channel::Unknown1, Channel::Unknown1])
        );
    }

    #[test]
    fn test_output_layout_legacy() {
        let out = output_layout(None, &ChannelLayout::surround51(), 6);
        assert_eq!(
            out,
            layout(&[
                Channel::FL,
                Channel::FR,
                Channel::BL,
                Channel::BR,
                Channel::FC,
                Channel::LFE,
            ])
        );
    }

    #[test]
    fn test_chmap_union() {
        let maps = vec![
            ChmapQuery::fixed(&[ChmapPosition::FL, ChmapPosition::FR]),
            ChmapQuery::fixed(&[ChmapPosition::FL, ChmapPosition::FR, ChmapPosition::FC]),
        ];
        assert_eq!(
            chmap_union(&maps),
            layout(&[Channel::FL, Channel::FR, Channel::FC])
        );
    }
}
