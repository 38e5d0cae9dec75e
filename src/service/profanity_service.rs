use rustrict::CensorStr;

/// Seam in front of the profanity crate so matching and redaction share one
/// detector surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfanityFilter;

impl ProfanityFilter {
    pub fn is_profane(&self, content: &str) -> bool {
        content.is_inappropriate()
    }

    pub fn censor(&self, content: &str) -> String {
        content.censor()
    }
}
