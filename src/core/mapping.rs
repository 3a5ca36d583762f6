//! Detector channel mapping.
//!
//! Every builder is a pure function of the run number: the same run always
//! yields the same boards, tower lists, and channel assignments. Histogram
//! lookup keys and output file names are derived from these structures, so
//! determinism here is what makes reruns reproducible.

/// Calorimeter tower coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tower {
    pub ix: i32,
    pub iy: i32,
}

/// Zero-padded coordinate label; negative values get an `m` prefix, so
/// `-3` becomes `m03` and `7` becomes `07`.
pub fn coord_label(v: i32) -> String {
    if v < 0 {
        format!("m{:02}", -v)
    } else {
        format!("{:02}", v)
    }
}

/// Readout variable of a tower: Cerenkov or Scintillator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Cer,
    Sci,
}

impl ChannelKind {
    pub const BOTH: [ChannelKind; 2] = [ChannelKind::Cer, ChannelKind::Sci];

    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::Cer => "Cer",
            ChannelKind::Sci => "Sci",
        }
    }
}

/// A FERS channel is addressed by channel number alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FersChannel {
    pub channel: u8,
}

/// DRS channels are addressed by (group, channel) within the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrsChannel {
    pub group: u8,
    pub channel: u8,
}

/// One FERS energy-readout board: an ordered tower patch, two channels per
/// tower.
#[derive(Debug, Clone)]
pub struct FersBoard {
    pub board_no: u8,
    towers: Vec<Tower>,
}

impl FersBoard {
    pub fn new(board_no: u8, towers: Vec<Tower>) -> Self {
        Self { board_no, towers }
    }

    pub fn towers(&self) -> &[Tower] {
        &self.towers
    }

    pub fn channel(&self, tower: Tower, kind: ChannelKind) -> FersChannel {
        let idx = self.tower_index(tower);
        FersChannel {
            channel: (2 * idx + offset(kind)) as u8,
        }
    }

    fn tower_index(&self, tower: Tower) -> usize {
        self.towers
            .iter()
            .position(|&t| t == tower)
            .unwrap_or_default()
    }
}

/// One DRS waveform-digitizer board; channels are grouped eight per group.
#[derive(Debug, Clone)]
pub struct DrsBoard {
    pub board_no: u8,
    towers: Vec<Tower>,
}

impl DrsBoard {
    pub fn new(board_no: u8, towers: Vec<Tower>) -> Self {
        Self { board_no, towers }
    }

    pub fn towers(&self) -> &[Tower] {
        &self.towers
    }

    pub fn channel(&self, tower: Tower, kind: ChannelKind) -> DrsChannel {
        let idx = self.tower_index(tower);
        let linear = 2 * idx + offset(kind);
        DrsChannel {
            group: (linear / 8) as u8,
            channel: (linear % 8) as u8,
        }
    }

    fn tower_index(&self, tower: Tower) -> usize {
        self.towers
            .iter()
            .position(|&t| t == tower)
            .unwrap_or_default()
    }
}

fn offset(kind: ChannelKind) -> usize {
    match kind {
        ChannelKind::Cer => 0,
        ChannelKind::Sci => 1,
    }
}

/// Ordered tower patch: rows top-down, columns left to right.
fn patch(x_lo: i32, x_hi: i32, y_lo: i32, y_hi: i32) -> Vec<Tower> {
    let mut towers = Vec::new();
    for iy in (y_lo..y_hi).rev() {
        for ix in x_lo..x_hi {
            towers.push(Tower { ix, iy });
        }
    }
    towers
}

/// FERS boards for a run. The calorimeter was extended for the later part
/// of the campaign: two boards before run 900, four from run 900 on. Each
/// board serves an 8 x 4 tower patch (64 channels).
pub fn build_fers_boards(run: u32) -> Vec<FersBoard> {
    let n_boards: u8 = if run >= 900 { 4 } else { 2 };
    (0..n_boards)
        .map(|b| {
            let y_hi = 8 - 4 * b as i32;
            FersBoard::new(b, patch(-4, 4, y_hi - 4, y_hi))
        })
        .collect()
}

/// DRS boards for a run: two boards over the central 4 x 4 patches
/// (32 channels each, four groups of eight).
pub fn build_drs_boards(_run: u32) -> Vec<DrsBoard> {
    (0..2u8)
        .map(|b| {
            let y_hi = 4 - 4 * b as i32;
            DrsBoard::new(b, patch(-2, 2, y_hi - 4, y_hi))
        })
        .collect()
}

/// Upstream and downstream MCP time-reference channels.
pub fn time_reference_channels(_run: u32) -> Vec<String> {
    vec!["MCP_U".to_string(), "MCP_D".to_string()]
}

/// Hodoscope trigger counters.
pub fn hodo_trigger_channels(_run: u32) -> Vec<String> {
    ["TrigTop", "TrigBottom", "TrigLeft", "TrigRight"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Hodoscope position channels, grouped by readout board: one X plane and
/// one Y plane, eight fibers each.
pub fn hodo_pos_channels(_run: u32) -> Vec<(String, Vec<String>)> {
    ["HodoX", "HodoY"]
        .into_iter()
        .map(|board| {
            let channels = (0..8).map(|i| format!("{}_{}", board, i)).collect();
            (board.to_string(), channels)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_labels_are_zero_padded_and_signed() {
        assert_eq!(coord_label(0), "00");
        assert_eq!(coord_label(7), "07");
        assert_eq!(coord_label(12), "12");
        assert_eq!(coord_label(-3), "m03");
    }

    #[test]
    fn builders_are_deterministic() {
        let a = build_fers_boards(316);
        let b = build_fers_boards(316);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.board_no, y.board_no);
            assert_eq!(x.towers(), y.towers());
        }
    }

    #[test]
    fn campaign_extension_adds_boards() {
        assert_eq!(build_fers_boards(899).len(), 2);
        assert_eq!(build_fers_boards(900).len(), 4);
    }

    #[test]
    fn fers_board_covers_32_towers_with_unique_channels() {
        let boards = build_fers_boards(1000);
        for board in &boards {
            assert_eq!(board.towers().len(), 32);
            let mut seen = std::collections::HashSet::new();
            for &tower in board.towers() {
                for kind in ChannelKind::BOTH {
                    assert!(seen.insert(board.channel(tower, kind).channel));
                }
            }
            assert_eq!(seen.len(), 64);
        }
    }

    #[test]
    fn drs_channels_group_by_eight() {
        let boards = build_drs_boards(316);
        assert_eq!(boards.len(), 2);
        let board = &boards[0];
        assert_eq!(board.towers().len(), 16);

        let first = board.towers()[0];
        assert_eq!(
            board.channel(first, ChannelKind::Cer),
            DrsChannel { group: 0, channel: 0 }
        );
        assert_eq!(
            board.channel(first, ChannelKind::Sci),
            DrsChannel { group: 0, channel: 1 }
        );

        let fifth = board.towers()[4];
        assert_eq!(
            board.channel(fifth, ChannelKind::Cer),
            DrsChannel { group: 1, channel: 0 }
        );
    }

    #[test]
    fn drs_towers_include_negative_coordinates() {
        let boards = build_drs_boards(316);
        assert!(boards[1].towers().iter().all(|t| t.iy < 0));
        assert!(boards[0].towers().iter().any(|t| t.ix < 0));
    }

    #[test]
    fn hodo_pos_boards_are_ordered() {
        let channels = hodo_pos_channels(316);
        assert_eq!(channels[0].0, "HodoX");
        assert_eq!(channels[1].0, "HodoY");
        assert_eq!(channels[0].1.len(), 8);
        assert_eq!(channels[1].1[7], "HodoY_7");
    }
}
