use image::DynamicImage;
use image::imageops::FilterType;

/// Operation producing one derivative from the decoded source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Shrink to fit inside `width` x `height`, preserving aspect ratio.
    /// Sources that already fit are kept at their own size.
    Resize { width: u32, height: u32 },
    Grayscale,
    /// Gaussian blur with the given sigma
    Blur { sigma: f32 },
}

/// A named derivative written as `<name>.jpg`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variant {
    pub name: &'static str,
    pub operation: Operation,
}

/// Derivatives generated for every work item, in generation order
pub const VARIANTS: [Variant; 6] = [
    Variant {
        name: "thumbnail",
        operation: Operation::Resize { width: 150, height: 150 },
    },
    Variant {
        name: "small",
        operation: Operation::Resize { width: 300, height: 300 },
    },
    Variant {
        name: "medium",
        operation: Operation::Resize { width: 600, height: 600 },
    },
    Variant {
        name: "large",
        operation: Operation::Resize { width: 1200, height: 1200 },
    },
    Variant {
        name: "grayscale",
        operation: Operation::Grayscale,
    },
    Variant {
        name: "blur",
        operation: Operation::Blur { sigma: 5.0 },
    },
];

impl Variant {
    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.name)
    }

    /// Produce this derivative from `source`
    ///
    /// `source` is only borrowed; every operation returns a new image so all
    /// variants start from the same decoded pixels.
    pub fn apply(&self, source: &DynamicImage) -> Result<DynamicImage, String> {
        if source.width() == 0 || source.height() == 0 {
            return Err(format!(
                "source image has no pixels ({}x{})",
                source.width(),
                source.height()
            ));
        }

        match self.operation {
            Operation::Resize { width, height } => {
                if width == 0 || height == 0 {
                    return Err(format!("invalid resize target {width}x{height}"));
                }
                if source.width() <= width && source.height() <= height {
                    return Ok(source.clone());
                }
                Ok(source.resize(width, height, FilterType::Lanczos3))
            }
            Operation::Grayscale => Ok(source.grayscale()),
            Operation::Blur { sigma } => {
                if !sigma.is_finite() || sigma <= 0.0 {
                    return Err(format!("invalid blur sigma {sigma}"));
                }
                Ok(source.blur(sigma))
            }
        }
    }
}
