//! Scalability-mode descriptor parsing.
//!
//! Layered (simulcast/SVC) encodings describe their layer structure with a
//! compact ASCII descriptor such as `L2T3` or `S3T2`: a case-sensitive
//! spatial marker (`L` or `S`), the spatial layer count (1–99), a literal
//! `T`, and the temporal layer count (1–99). Matching is a prefix match, so
//! trailing suffixes like `L2T3_KEY` are accepted and ignored.
//!
//! Scalability information is advisory: malformed or absent descriptors
//! parse to the single-layer default instead of failing, so a bad descriptor
//! can never abort negotiation.

/// Spatial/temporal layer counts parsed from a scalability-mode descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalabilityMode {
    pub spatial_layers: u8,
    pub temporal_layers: u8,
}

impl Default for ScalabilityMode {
    fn default() -> Self {
        Self {
            spatial_layers: 1,
            temporal_layers: 1,
        }
    }
}

/// Read one or two decimal digits with a non-zero leading digit.
/// Returns the value and the number of bytes consumed.
fn layer_count(bytes: &[u8]) -> Option<(u8, usize)> {
    let first = *bytes.first()?;
    if !first.is_ascii_digit() || first == b'0' {
        return None;
    }
    let mut value = first - b'0';
    match bytes.get(1) {
        Some(second) if second.is_ascii_digit() => {
            value = value * 10 + (second - b'0');
            Some((value, 2))
        }
        _ => Some((value, 1)),
    }
}

/// Parse a scalability-mode descriptor (prefix match of
/// `[LS]<1-99>T<1-99>`).
///
/// Any non-match — `None`, an empty string, a malformed descriptor, a
/// zero-leading count — yields [`ScalabilityMode::default()`].
pub fn parse(scalability_mode: Option<&str>) -> ScalabilityMode {
    let Some(mode) = scalability_mode else {
        return ScalabilityMode::default();
    };

    let bytes = mode.as_bytes();
    let parsed = (|| {
        match bytes.first()? {
            b'L' | b'S' => {}
            _ => return None,
        }
        let (spatial_layers, used) = layer_count(&bytes[1..])?;
        let rest = &bytes[1 + used..];
        if rest.first() != Some(&b'T') {
            return None;
        }
        let (temporal_layers, _) = layer_count(&rest[1..])?;
        Some(ScalabilityMode {
            spatial_layers,
            temporal_layers,
        })
    })();

    parsed.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers(spatial: u8, temporal: u8) -> ScalabilityMode {
        ScalabilityMode {
            spatial_layers: spatial,
            temporal_layers: temporal,
        }
    }

    #[test]
    fn plain_descriptors() {
        assert_eq!(parse(Some("L2T3")), layers(2, 3));
        assert_eq!(parse(Some("S3T2")), layers(3, 2));
        assert_eq!(parse(Some("L1T1")), layers(1, 1));
    }

    #[test]
    fn two_digit_counts() {
        assert_eq!(parse(Some("L12T40")), layers(12, 40));
        assert_eq!(parse(Some("S99T99")), layers(99, 99));
    }

    #[test]
    fn prefix_match_ignores_trailing() {
        assert_eq!(parse(Some("S1T1extra")), layers(1, 1));
        assert_eq!(parse(Some("L2T3_KEY")), layers(2, 3));
    }

    #[test]
    fn non_matches_default() {
        assert_eq!(parse(None), ScalabilityMode::default());
        assert_eq!(parse(Some("")), ScalabilityMode::default());
        assert_eq!(parse(Some("garbage")), ScalabilityMode::default());
        assert_eq!(parse(Some("T3L2")), ScalabilityMode::default());
        // Case-sensitive marker.
        assert_eq!(parse(Some("l2T3")), ScalabilityMode::default());
        // Zero-leading counts are not a valid layer count.
        assert_eq!(parse(Some("L0T3")), ScalabilityMode::default());
        assert_eq!(parse(Some("L2T0")), ScalabilityMode::default());
        // Missing temporal part.
        assert_eq!(parse(Some("L2")), ScalabilityMode::default());
        assert_eq!(parse(Some("L2T")), ScalabilityMode::default());
        // Counts are at most two digits; a third digit breaks the match.
        assert_eq!(parse(Some("L123T4")), ScalabilityMode::default());
    }
}
