//
// palette.rs
// Tag2Dcm-rs
//
// Fixed 256-entry label-to-RGB lookup table for body-composition tissue labels.
//

pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];

/// Tissue classes with a dedicated color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TissueLabel {
    Muscle = 1,
    IntermuscularAdipose = 2,
    VisceralAdipose = 5,
    SubcutaneousAdipose = 7,
    Unknown = 12,
}

impl TissueLabel {
    pub const ALL: [TissueLabel; 5] = [
        TissueLabel::Muscle,
        TissueLabel::IntermuscularAdipose,
        TissueLabel::VisceralAdipose,
        TissueLabel::SubcutaneousAdipose,
        TissueLabel::Unknown,
    ];

    pub const fn color(self) -> Rgb {
        match self {
            TissueLabel::Muscle => [255, 0, 0],
            TissueLabel::IntermuscularAdipose => [0, 255, 0],
            TissueLabel::VisceralAdipose => [255, 255, 0],
            TissueLabel::SubcutaneousAdipose => [0, 255, 255],
            TissueLabel::Unknown => [0, 0, 255],
        }
    }

    pub fn from_label(label: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u16 == label)
    }
}

/// Immutable label -> color table. Labels without a tissue class are black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [Rgb; 256],
}

impl Palette {
    const fn body_composition() -> Self {
        let mut entries = [BLACK; 256];
        let mut i = 0;
        while i < TissueLabel::ALL.len() {
            let tissue = TissueLabel::ALL[i];
            entries[tissue as usize] = tissue.color();
            i += 1;
        }
        Self { entries }
    }

    /// Color for `label`; `None` when the label lies outside 0..=255.
    #[inline]
    pub fn lookup(&self, label: u16) -> Option<Rgb> {
        self.entries.get(label as usize).copied()
    }

    pub fn entries(&self) -> &[Rgb; 256] {
        &self.entries
    }
}

/// Process-wide palette, built at compile time.
pub static PALETTE: Palette = Palette::body_composition();
