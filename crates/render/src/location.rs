//! Camera position as a shareable fragment: `mandelbulb;<x>;<y>;<z>`.
//!
//! Coordinates use Rust's shortest round-trip float formatting, so parsing an
//! encoded fragment restores the exact position.

use fractal::Vec3;

pub const FRACTAL: &str = "mandelbulb";

#[must_use]
pub fn encode(position: Vec3) -> String {
    format!("{FRACTAL};{};{};{}", position.x, position.y, position.z)
}

/// Parses a fragment, with or without its leading `#`. Fragments naming
/// another fractal, malformed numbers and non-finite coordinates give `None`.
#[must_use]
pub fn parse(fragment: &str) -> Option<Vec3> {
    let fragment = fragment.trim();
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let mut parts = fragment.split(';');
    if parts.next()? != FRACTAL {
        return None;
    }
    let x = parts.next()?.trim().parse::<f64>().ok()?;
    let y = parts.next()?.trim().parse::<f64>().ok()?;
    let z = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let v = Vec3::new(x, y, z);
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_positions_parse_back_exactly() {
        for v in [
            Vec3::new(0.0, 0.0, -1.1),
            Vec3::new(1.0 / 3.0, -2.718_281_828_459_045, 1e-300),
            Vec3::new(-0.0, 123_456.789, 5e-324),
        ] {
            let text = encode(v);
            assert_eq!(parse(&text), Some(v), "{text}");
            assert_eq!(parse(&format!("#{text}")), Some(v));
        }
    }

    #[test]
    fn default_camera_fragment() {
        assert_eq!(encode(Vec3::new(0.0, 0.0, -1.1)), "mandelbulb;0;0;-1.1");
    }

    #[test]
    fn foreign_or_broken_fragments_are_ignored() {
        for bad in [
            "",
            "#",
            "mandelbox;0;0;0",
            "mandelbulb;0;0",
            "mandelbulb;0;0;0;0",
            "mandelbulb;a;0;0",
            "mandelbulb;NaN;0;0",
            "mandelbulb;inf;0;0",
        ] {
            assert_eq!(parse(bad), None, "{bad:?}");
        }
    }
}
