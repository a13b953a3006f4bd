//! Image transform URLs
//!
//! Transform options are appended to an asset URL as a query string in the
//! order they were set. Nothing is re-sorted or escaped, so the same options
//! always produce the same URL (and the same CDN cache key).

use crate::params::{scalar_string, ParameterBag};
use serde_json::Value;

/// Append `params` to `base_url` as `?k1=v1&k2=v2...`.
///
/// Keys keep their insertion order and values are written in their plain
/// string form; arrays are comma-joined. An empty bag returns `base_url`
/// unchanged. If `base_url` already has a query string the pairs are
/// appended with `&`.
pub fn build_url(base_url: &str, params: &ParameterBag) -> String {
    if params.is_empty() {
        return base_url.to_string();
    }

    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, transform_value(value)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base_url, separator, query)
}

fn transform_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Vec<_>>()
            .join(","),
        other => scalar_string(other),
    }
}

/// Output format for `format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpg,
    Pjpg,
    Webp,
    Webpll,
    Webply,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Pjpg => "pjpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Webpll => "webpll",
            ImageFormat::Webply => "webply",
        }
    }
}

/// Typed builder over the transform parameters.
///
/// Every setter writes one key; [`param`](Self::param) covers keys this
/// builder does not know about.
///
/// ```rust
/// use delivery_sdk::image::ImageTransform;
///
/// let url = ImageTransform::new()
///     .auto("webp")
///     .quality(200)
///     .url("https://images.example.com/v3/assets/blt1/blt2/photo.jpg");
///
/// assert_eq!(
///     url,
///     "https://images.example.com/v3/assets/blt1/blt2/photo.jpg?auto=webp&quality=200"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageTransform {
    params: ParameterBag,
}

impl ImageTransform {
    /// Create an empty transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Automatic optimization, e.g. `webp`.
    pub fn auto(self, value: impl Into<String>) -> Self {
        self.param("auto", value.into())
    }

    /// Output quality, 1 to 100.
    pub fn quality(self, quality: u32) -> Self {
        self.param("quality", quality)
    }

    /// Output width in pixels.
    pub fn width(self, width: u32) -> Self {
        self.param("width", width)
    }

    /// Output height in pixels.
    pub fn height(self, height: u32) -> Self {
        self.param("height", height)
    }

    /// Output format.
    pub fn format(self, format: ImageFormat) -> Self {
        self.param("format", format.as_str())
    }

    /// Crop region, e.g. `"300,400"` or `"3:5"`
    pub fn crop(self, value: impl Into<String>) -> Self {
        self.param("crop", value.into())
    }

    /// Edge trim, e.g. `"20,20,20,20"`
    pub fn trim(self, value: impl Into<String>) -> Self {
        self.param("trim", value.into())
    }

    pub fn disable(self, value: impl Into<String>) -> Self {
        self.param("disable", value.into())
    }

    pub fn pad(self, value: impl Into<String>) -> Self {
        self.param("pad", value.into())
    }

    /// Background color, hex (`"#FFFFFF"`) or RGB(A) tuple, passed through verbatim
    pub fn bg_color(self, value: impl Into<String>) -> Self {
        self.param("bg-color", value.into())
    }

    pub fn dpr(self, value: impl Into<Value>) -> Self {
        self.param("dpr", value)
    }

    pub fn canvas(self, value: impl Into<String>) -> Self {
        self.param("canvas", value.into())
    }

    pub fn orient(self, value: u8) -> Self {
        self.param("orient", value)
    }

    pub fn fit(self, value: impl Into<String>) -> Self {
        self.param("fit", value.into())
    }

    /// Set any transform key
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Transform parameters in the order they were set.
    pub fn params(&self) -> &ParameterBag {
        &self.params
    }

    /// Transformed URL for `base_url`
    pub fn url(&self, base_url: &str) -> String {
        build_url(base_url, &self.params)
    }
}

impl From<ParameterBag> for ImageTransform {
    fn from(params: ParameterBag) -> Self {
        Self { params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://images.contentstack.io/v3/assets/blt1/blt2/1.jpg";

    #[test]
    fn test_auto_and_quality_in_order() {
        let params = ParameterBag::new().with("auto", "webp").with("quality", 200);
        assert_eq!(build_url(BASE, &params), format!("{}?auto=webp&quality=200", BASE));
    }

    #[test]
    fn test_empty_params_returns_base() {
        assert_eq!(build_url(BASE, &ParameterBag::new()), BASE);
    }

    #[test]
    fn test_no_resorting_or_escaping() {
        let params = ParameterBag::new()
            .with("width", 300)
            .with("crop", "3:5")
            .with("trim", "20,20,20,20")
            .with("bg-color", "#FFFFFF")
            .with("auto", "webp");

        assert_eq!(
            build_url(BASE, &params),
            format!(
                "{}?width=300&crop=3:5&trim=20,20,20,20&bg-color=#FFFFFF&auto=webp",
                BASE
            )
        );
    }

    #[test]
    fn test_round_trip_pair_count_and_order() {
        let params = ParameterBag::new()
            .with("height", 250)
            .with("dpr", 2)
            .with("format", "png")
            .with("orient", 3);

        let url = build_url(BASE, &params);
        let (_, query) = url.split_once('?').unwrap();
        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split_once('=').unwrap().0)
            .collect();

        let expected: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_input_not_mutated() {
        let params = ParameterBag::new().with("auto", "webp");
        let before = params.clone();
        let _ = build_url(BASE, &params);
        assert_eq!(params, before);
    }

    #[test]
    fn test_existing_query_string_uses_ampersand() {
        let params = ParameterBag::new().with("width", 100);
        assert_eq!(
            build_url("https://cdn.example.com/a.png?v=2", &params),
            "https://cdn.example.com/a.png?v=2&width=100"
        );
    }

    #[test]
    fn test_typed_builder() {
        let transform = ImageTransform::new()
            .width(400)
            .height(300)
            .format(ImageFormat::Webp)
            .bg_color("#00FF00")
            .param("overlay", "/v3/assets/blt/logo.png")
            .param("pad", json!([25, 25, 25, 25]));

        assert_eq!(
            transform.url(BASE),
            format!(
                "{}?width=400&height=300&format=webp&bg-color=#00FF00&overlay=/v3/assets/blt/logo.png&pad=25,25,25,25",
                BASE
            )
        );
    }
}
