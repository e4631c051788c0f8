//! Handwritten math recognition client and result overlays.
//!
//! The canvas is sent as a PNG data URI together with the known variable
//! bindings; the recognizer answers with one record per expression it found.
//! Results are shown as LaTeX overlays after a fixed delay, all anchored at
//! the centre of the drawn content.

use crate::BoxFuture;
use crate::surface::{Snapshot, SurfaceError};
use kurbo::Point;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default recognizer endpoint.
pub const DEFAULT_RECOGNIZER_URL: &str = "https://calc-be.vercel.app/calculate";

/// Default delay before a recognized result is shown.
pub const DEFAULT_RESULT_DELAY: Duration = Duration::from_millis(1000);

/// Recognition errors.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Failed to encode canvas: {0}")]
    Encode(#[from] SurfaceError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Recognizer returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Result type for recognition operations.
pub type RecognitionResult<T> = Result<T, RecognitionError>;

/// Request body sent to the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    /// PNG data URI of the full canvas.
    pub image: String,
    pub dict_of_vars: BTreeMap<String, String>,
}

/// One expression found by the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedExpression {
    #[serde(deserialize_with = "string_or_scalar")]
    pub expr: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub result: String,
    /// Whether this record binds `expr` as a variable to `result`.
    #[serde(default)]
    pub assign: bool,
}

/// Response body returned by the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub data: Vec<RecognizedExpression>,
}

/// Numbers and booleans are accepted where a string is expected.
fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a string, found {}", other))),
    }
}

/// Parse a recognizer response body.
pub fn parse_response(body: &str) -> RecognitionResult<Vec<RecognizedExpression>> {
    serde_json::from_str::<RecognitionResponse>(body)
        .map(|r| r.data)
        .map_err(|e| RecognitionError::Malformed(e.to_string()))
}

/// Fold `assign` records into the bindings, in response order.
pub fn apply_assignments(
    bindings: &mut BTreeMap<String, String>,
    records: &[RecognizedExpression],
) -> usize {
    let mut applied = 0;
    for record in records.iter().filter(|r| r.assign) {
        bindings.insert(record.expr.clone(), record.result.clone());
        applied += 1;
    }
    applied
}

/// A remote math recognizer.
pub trait Recognizer {
    /// Submit one request and return the recognized expressions.
    fn recognize<'a>(
        &'a self,
        request: &'a RecognitionRequest,
    ) -> BoxFuture<'a, RecognitionResult<Vec<RecognizedExpression>>>;
}

/// Recognizer reached over HTTP with a JSON POST.
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognizer {
    /// Create a client for `endpoint`. `timeout` is ignored on wasm32, where
    /// the browser enforces its own limits.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> RecognitionResult<Self> {
        #[allow(unused_mut)]
        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        #[cfg(target_arch = "wasm32")]
        let _ = timeout;

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Recognizer for HttpRecognizer {
    fn recognize<'a>(
        &'a self,
        request: &'a RecognitionRequest,
    ) -> BoxFuture<'a, RecognitionResult<Vec<RecognizedExpression>>> {
        Box::pin(async move {
            log::debug!(
                "Posting canvas to {} with {} bindings",
                self.endpoint,
                request.dict_of_vars.len()
            );
            let response = self.client.post(&self.endpoint).json(request).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(RecognitionError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            parse_response(&body)
        })
    }
}

/// Inclusive bounding box of the non-transparent pixels of a snapshot.
///
/// With no such pixel the box stays at its initial `(width, height, 0, 0)`,
/// which puts its centre in the middle of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ContentBounds {
    /// Scan every pixel with alpha > 0.
    pub fn of(snapshot: &Snapshot) -> Self {
        let (width, height) = (snapshot.width(), snapshot.height());
        let mut bounds = Self {
            min_x: width,
            min_y: height,
            max_x: 0,
            max_y: 0,
        };
        if width == 0 {
            return bounds;
        }

        for (i, pixel) in snapshot.pixels().chunks_exact(4).enumerate() {
            if pixel[3] == 0 {
                continue;
            }
            let x = (i % width as usize) as u32;
            let y = (i / width as usize) as u32;
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        bounds
    }

    /// Whether any non-transparent pixel was found.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x as f64 + self.max_x as f64) / 2.0,
            (self.min_y as f64 + self.max_y as f64) / 2.0,
        )
    }
}

/// The latest result shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResult {
    pub expression: String,
    pub answer: String,
}

impl From<&RecognizedExpression> for GeneratedResult {
    fn from(record: &RecognizedExpression) -> Self {
        Self {
            expression: record.expr.clone(),
            answer: record.result.clone(),
        }
    }
}

/// LaTeX source of the overlay for one result.
pub fn latex_overlay(expression: &str, answer: &str) -> String {
    format!(r"\(\LARGE{{{} = {}}}\)", expression, answer)
}

#[derive(Debug, Clone)]
struct StagedResult {
    due: Instant,
    result: GeneratedResult,
}

/// Result overlays: the active result, every overlay shown so far, the
/// shared overlay position and results waiting to be shown.
#[derive(Debug, Clone)]
pub struct OverlayBoard {
    result: Option<GeneratedResult>,
    expressions: Vec<String>,
    position: Point,
    staged: Vec<StagedResult>,
    delay: Duration,
}

impl OverlayBoard {
    pub fn new(position: Point, delay: Duration) -> Self {
        Self {
            result: None,
            expressions: Vec::new(),
            position,
            staged: Vec::new(),
            delay,
        }
    }

    /// Restore previously shown overlays.
    pub fn restore(
        &mut self,
        result: Option<GeneratedResult>,
        expressions: Vec<String>,
        position: Point,
    ) {
        self.result = result;
        self.expressions = expressions;
        self.position = position;
    }

    pub fn result(&self) -> Option<&GeneratedResult> {
        self.result.as_ref()
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Number of results waiting to be shown.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// When the next staged result becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.staged.iter().map(|s| s.due).min()
    }

    /// Queue every record for display `delay` after `now`.
    pub fn stage(&mut self, records: &[RecognizedExpression], now: Instant) {
        let due = now + self.delay;
        self.staged.extend(records.iter().map(|record| StagedResult {
            due,
            result: record.into(),
        }));
    }

    /// Show every staged result due at `now`, oldest first.
    pub fn promote_due(&mut self, now: Instant) -> Vec<GeneratedResult> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.staged.drain(..).partition(|s| s.due <= now);
        self.staged = waiting;
        due.sort_by_key(|s| s.due);

        due.into_iter()
            .map(|staged| {
                self.show(staged.result.clone());
                staged.result
            })
            .collect()
    }

    /// Make `result` the active result and append its overlay.
    pub fn show(&mut self, result: GeneratedResult) {
        self.expressions.push(latex_overlay(&result.expression, &result.answer));
        self.result = Some(result);
    }

    /// Drop the active result, every overlay and anything still staged.
    /// The position is kept.
    pub fn reset(&mut self) {
        self.result = None;
        self.expressions.clear();
        self.staged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expr: &str, result: &str, assign: bool) -> RecognizedExpression {
        RecognizedExpression {
            expr: expr.to_string(),
            result: result.to_string(),
            assign,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let mut dict_of_vars = BTreeMap::new();
        dict_of_vars.insert("x".to_string(), "5".to_string());
        let request = RecognitionRequest {
            image: "data:image/png;base64,AAAA".to_string(),
            dict_of_vars,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["image"], "data:image/png;base64,AAAA");
        assert_eq!(value["dict_of_vars"]["x"], "5");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"data":[
            {"expr":"x","result":"5","assign":true},
            {"expr":"2 + x","result":7,"assign":false},
            {"expr":"y","result":"3"}
        ]}"#;
        let records = parse_response(body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record("x", "5", true));
        assert_eq!(records[1].result, "7");
        assert!(!records[2].assign);
    }

    #[test]
    fn test_parse_malformed_response() {
        assert!(matches!(parse_response("{}"), Err(RecognitionError::Malformed(_))));
        assert!(matches!(parse_response("<html>"), Err(RecognitionError::Malformed(_))));
        assert!(matches!(
            parse_response(r#"{"data":[{"expr":null,"result":"1"}]}"#),
            Err(RecognitionError::Malformed(_))
        ));
    }

    #[test]
    fn test_assignments_in_response_order() {
        let mut bindings = BTreeMap::new();
        bindings.insert("y".to_string(), "1".to_string());
        let records = vec![
            record("x", "5", true),
            record("x + 1", "6", false),
            record("x", "8", true),
        ];

        assert_eq!(apply_assignments(&mut bindings, &records), 2);
        assert_eq!(bindings.get("x").map(String::as_str), Some("8"));
        assert_eq!(bindings.get("y").map(String::as_str), Some("1"));
        assert!(!bindings.contains_key("x + 1"));
    }

    #[test]
    fn test_bounds_of_transparent_buffer() {
        let snapshot = Snapshot::blank(40, 30);
        let bounds = ContentBounds::of(&snapshot);
        assert!(bounds.is_empty());
        assert_eq!(
            bounds,
            ContentBounds {
                min_x: 40,
                min_y: 30,
                max_x: 0,
                max_y: 0
            }
        );
        assert_eq!(bounds.center(), Point::new(20.0, 15.0));
    }

    #[test]
    fn test_bounds_of_drawn_pixels() {
        let (w, h) = (10u32, 8u32);
        let mut pixels = vec![0u8; (w * h * 4) as usize];
        for (x, y) in [(2u32, 3u32), (7, 1), (4, 6)] {
            pixels[((y * w + x) * 4 + 3) as usize] = 1;
        }
        let snapshot = Snapshot::new(w, h, pixels).unwrap();

        let bounds = ContentBounds::of(&snapshot);
        assert_eq!((bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y), (2, 1, 7, 6));
        assert_eq!(bounds.center(), Point::new(4.5, 3.5));
    }

    #[test]
    fn test_latex_overlay_format() {
        assert_eq!(latex_overlay("2 + 2", "4"), r"\(\LARGE{2 + 2 = 4}\)");
    }

    #[test]
    fn test_staged_results_wait_for_delay() {
        let mut board = OverlayBoard::new(Point::new(10.0, 200.0), Duration::from_millis(1000));
        let now = Instant::now();
        board.stage(&[record("1 + 1", "2", false), record("x", "5", true)], now);

        assert_eq!(board.staged_len(), 2);
        assert_eq!(board.next_due(), Some(now + Duration::from_millis(1000)));
        assert!(board.promote_due(now + Duration::from_millis(999)).is_empty());
        assert!(board.result().is_none());

        let shown = board.promote_due(now + Duration::from_millis(1000));
        assert_eq!(shown.len(), 2);
        assert_eq!(board.staged_len(), 0);
        assert_eq!(
            board.expressions(),
            &[r"\(\LARGE{1 + 1 = 2}\)".to_string(), r"\(\LARGE{x = 5}\)".to_string()]
        );
        assert_eq!(
            board.result(),
            Some(&GeneratedResult {
                expression: "x".to_string(),
                answer: "5".to_string()
            })
        );
    }

    #[test]
    fn test_reset_keeps_position() {
        let mut board = OverlayBoard::new(Point::new(10.0, 200.0), DEFAULT_RESULT_DELAY);
        board.set_position(Point::new(50.0, 60.0));
        board.show(GeneratedResult {
            expression: "a".to_string(),
            answer: "b".to_string(),
        });
        board.stage(&[record("c", "d", false)], Instant::now());

        board.reset();
        assert!(board.result().is_none());
        assert!(board.expressions().is_empty());
        assert_eq!(board.staged_len(), 0);
        assert_eq!(board.position(), Point::new(50.0, 60.0));
    }
}
