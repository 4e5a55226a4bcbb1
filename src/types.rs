use fixed::types::I32F32;

/// Length in millimeters, the page unit used throughout composition.
/// Backed by a fixed-point value quantized to 1/1000 mm so cursor
/// arithmetic is exact and order-independent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Mm(I32F32);

impl Mm {
    pub const ZERO: Mm = Mm(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Mm {
        if !value.is_finite() {
            return Mm::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Mm::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Mm) -> Mm {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Mm) -> Mm {
        if self <= other { self } else { other }
    }

    pub fn is_positive(self) -> bool {
        self > Mm::ZERO
    }

    /// Points for PDF output. 1 mm = 72/25.4 pt.
    pub fn to_pt(self) -> f32 {
        self.to_f32() * 72.0 / 25.4
    }

    fn from_milli_i64(milli: i64) -> Mm {
        Mm::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Mm {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Mm(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Mm {
    type Output = Mm;
    fn add(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Mm {
    fn add_assign(&mut self, rhs: Mm) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Mm {
    type Output = Mm;
    fn sub(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::SubAssign for Mm {
    fn sub_assign(&mut self, rhs: Mm) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<f32> for Mm {
    type Output = Mm;
    fn mul(self, rhs: f32) -> Mm {
        if !rhs.is_finite() {
            return Mm::ZERO;
        }
        Mm::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<f32> for Mm {
    type Output = Mm;
    fn div(self, rhs: f32) -> Mm {
        if rhs == 0.0 || !rhs.is_finite() {
            Mm::ZERO
        } else {
            Mm::from_f32(self.to_f32() / rhs)
        }
    }
}

impl std::ops::Neg for Mm {
    type Output = Mm;
    fn neg(self) -> Mm {
        Mm::from_milli_i128(-(self.to_milli_i64() as i128))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Mm,
    pub height: Mm,
}

impl Size {
    pub fn new(width: Mm, height: Mm) -> Self {
        Self { width, height }
    }

    pub fn a4() -> Self {
        Self {
            width: Mm::from_f32(210.0),
            height: Mm::from_f32(297.0),
        }
    }

    pub fn a3() -> Self {
        Self {
            width: Mm::from_f32(297.0),
            height: Mm::from_f32(420.0),
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 25.4mm/in.
        Self {
            width: Mm::from_f32(215.9),
            height: Mm::from_f32(279.4),
        }
    }

    pub fn oriented(self, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => self,
            Orientation::Landscape => Self {
                width: self.height,
                height: self.width,
            },
        }
    }
}

/// Named page preset or an explicit width x height in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageFormat {
    A4,
    A3,
    Letter,
    Custom(f32, f32),
}

impl PageFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(PageFormat::A4),
            "a3" => Some(PageFormat::A3),
            "letter" => Some(PageFormat::Letter),
            _ => None,
        }
    }

    pub fn size(self) -> Size {
        match self {
            PageFormat::A4 => Size::a4(),
            PageFormat::A3 => Size::a3(),
            PageFormat::Letter => Size::letter(),
            PageFormat::Custom(width, height) => Size {
                width: Mm::from_f32(width),
                height: Mm::from_f32(height),
            },
        }
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::A4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "p" | "portrait" => Some(Orientation::Portrait),
            "l" | "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Mm,
    pub right: Mm,
    pub bottom: Mm,
    pub left: Mm,
}

impl Margins {
    pub fn zero() -> Self {
        Margins::all(0.0)
    }

    pub fn all(value: f32) -> Self {
        let v = Mm::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// Caller-facing margin shape: one number for all sides, or a partial
/// per-side object. Unspecified sides resolve to 0, not to the others.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginSpec {
    All(f32),
    Sides {
        top: Option<f32>,
        right: Option<f32>,
        bottom: Option<f32>,
        left: Option<f32>,
    },
}

impl MarginSpec {
    pub fn resolve(self) -> Margins {
        match self {
            MarginSpec::All(value) => Margins::all(value),
            MarginSpec::Sides {
                top,
                right,
                bottom,
                left,
            } => Margins {
                top: Mm::from_f32(top.unwrap_or(0.0)),
                right: Mm::from_f32(right.unwrap_or(0.0)),
                bottom: Mm::from_f32(bottom.unwrap_or(0.0)),
                left: Mm::from_f32(left.unwrap_or(0.0)),
            },
        }
    }
}

impl Default for MarginSpec {
    fn default() -> Self {
        MarginSpec::All(0.0)
    }
}
