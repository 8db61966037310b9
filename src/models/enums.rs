use serde::{Deserialize, Serialize};

/// Error returned when a label string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: '{value}'")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate an index-ordered label enum with as_str + std::str::FromStr.
///
/// Variant order is the positional order of the model output vector.
macro_rules! label_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in model output order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Position of this label in the model output vector.
            pub fn index(&self) -> usize {
                *self as usize
            }

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

label_enum!(SeverityStage {
    MildDemented => "MildDemented",
    ModerateDemented => "ModerateDemented",
    NonDemented => "NonDemented",
    VeryMildDemented => "VeryMildDemented",
});

label_enum!(GateLabel {
    Mri => "MRI",
    NonMri => "NonMRI",
});

label_enum!(ColorMode {
    Grayscale => "grayscale",
    Rgb => "rgb",
});

impl SeverityStage {
    /// Number of stages the diagnosis model scores.
    pub const COUNT: usize = 4;
}

impl ColorMode {
    /// Channel count of a tensor produced in this color mode.
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
        }
    }
}
