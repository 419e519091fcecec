use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability-of-worthless bucket used by the recovery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProbabilityBin {
    #[serde(rename = "<50%")]
    Below50,
    #[serde(rename = "50-60%")]
    From50To60,
    #[serde(rename = "60-70%")]
    From60To70,
    #[serde(rename = "70-80%")]
    From70To80,
    #[serde(rename = "80-90%")]
    From80To90,
    #[serde(rename = "90%+")]
    Above90,
}

impl ProbabilityBin {
    pub const ALL: [ProbabilityBin; 6] = [
        ProbabilityBin::Below50,
        ProbabilityBin::From50To60,
        ProbabilityBin::From60To70,
        ProbabilityBin::From70To80,
        ProbabilityBin::From80To90,
        ProbabilityBin::Above90,
    ];

    /// Strict `<` at each boundary, so 0.6 falls in 60-70%.
    pub fn of(prob: f64) -> Self {
        if prob < 0.5 {
            ProbabilityBin::Below50
        } else if prob < 0.6 {
            ProbabilityBin::From50To60
        } else if prob < 0.7 {
            ProbabilityBin::From60To70
        } else if prob < 0.8 {
            ProbabilityBin::From70To80
        } else if prob < 0.9 {
            ProbabilityBin::From80To90
        } else {
            ProbabilityBin::Above90
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbabilityBin::Below50 => "<50%",
            ProbabilityBin::From50To60 => "50-60%",
            ProbabilityBin::From60To70 => "60-70%",
            ProbabilityBin::From70To80 => "70-80%",
            ProbabilityBin::From80To90 => "80-90%",
            ProbabilityBin::Above90 => "90%+",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label.trim())
    }
}

impl fmt::Display for ProbabilityBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Days-to-expiry bucket, inclusive upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DteBin {
    #[serde(rename = "0-7")]
    UpTo7,
    #[serde(rename = "8-14")]
    UpTo14,
    #[serde(rename = "15-21")]
    UpTo21,
    #[serde(rename = "22-28")]
    UpTo28,
    #[serde(rename = "29-35")]
    UpTo35,
    #[serde(rename = "36+")]
    Over35,
}

impl DteBin {
    pub const ALL: [DteBin; 6] = [
        DteBin::UpTo7,
        DteBin::UpTo14,
        DteBin::UpTo21,
        DteBin::UpTo28,
        DteBin::UpTo35,
        DteBin::Over35,
    ];

    pub fn of(days: i64) -> Self {
        if days <= 7 {
            DteBin::UpTo7
        } else if days <= 14 {
            DteBin::UpTo14
        } else if days <= 21 {
            DteBin::UpTo21
        } else if days <= 28 {
            DteBin::UpTo28
        } else if days <= 35 {
            DteBin::UpTo35
        } else {
            DteBin::Over35
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DteBin::UpTo7 => "0-7",
            DteBin::UpTo14 => "8-14",
            DteBin::UpTo21 => "15-21",
            DteBin::UpTo28 => "22-28",
            DteBin::UpTo35 => "29-35",
            DteBin::Over35 => "36+",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label.trim())
    }
}

impl fmt::Display for DteBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_bin_boundaries_are_strict() {
        assert_eq!(ProbabilityBin::of(0.0).label(), "<50%");
        assert_eq!(ProbabilityBin::of(0.4999).label(), "<50%");
        assert_eq!(ProbabilityBin::of(0.5).label(), "50-60%");
        assert_eq!(ProbabilityBin::of(0.6).label(), "60-70%");
        assert_eq!(ProbabilityBin::of(0.72).label(), "70-80%");
        assert_eq!(ProbabilityBin::of(0.9).label(), "90%+");
        assert_eq!(ProbabilityBin::of(1.0).label(), "90%+");
    }

    #[test]
    fn probability_bins_cover_unit_interval() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..=1000 {
            seen.insert(ProbabilityBin::of(i as f64 / 1000.0));
        }
        assert_eq!(seen.len(), ProbabilityBin::ALL.len());
    }

    #[test]
    fn dte_bin_boundaries_are_inclusive() {
        assert_eq!(DteBin::of(0).label(), "0-7");
        assert_eq!(DteBin::of(7).label(), "0-7");
        assert_eq!(DteBin::of(8).label(), "8-14");
        assert_eq!(DteBin::of(35).label(), "29-35");
        assert_eq!(DteBin::of(36).label(), "36+");
    }

    #[test]
    fn labels_parse_back() {
        for b in ProbabilityBin::ALL {
            assert_eq!(ProbabilityBin::from_label(b.label()), Some(b));
        }
        for b in DteBin::ALL {
            assert_eq!(DteBin::from_label(b.label()), Some(b));
        }
    }
}
