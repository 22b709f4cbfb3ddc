use std::fmt;
use std::str::FromStr;

/// One rung of the fixed output ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    P1080,
    P720,
    P360,
    P120,
}

impl Resolution {
    /// Every resolution produced for an upload, in encoding order.
    pub const LADDER: [Resolution; 4] = [
        Resolution::P1080,
        Resolution::P720,
        Resolution::P360,
        Resolution::P120,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P360 => "360p",
            Resolution::P120 => "120p",
        }
    }

    /// Output height in pixels; the width follows the aspect ratio.
    pub fn height(self) -> u32 {
        match self {
            Resolution::P1080 => 1080,
            Resolution::P720 => 720,
            Resolution::P360 => 360,
            Resolution::P120 => 120,
        }
    }

    /// Target video bitrate in ffmpeg notation.
    pub fn bitrate(self) -> &'static str {
        match self {
            Resolution::P1080 => "4000k",
            Resolution::P720 => "2500k",
            Resolution::P360 => "1000k",
            Resolution::P120 => "400k",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::LADDER
            .into_iter()
            .find(|r| r.label() == s)
            .ok_or_else(|| format!("unknown resolution: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_descending() {
        let heights: Vec<u32> = Resolution::LADDER.iter().map(|r| r.height()).collect();
        assert_eq!(heights, vec![1080, 720, 360, 120]);
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for resolution in Resolution::LADDER {
            assert_eq!(resolution.label().parse::<Resolution>(), Ok(resolution));
        }
        assert!("480p".parse::<Resolution>().is_err());
    }
}
