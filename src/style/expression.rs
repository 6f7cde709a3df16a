//! Paint values and first-match expressions.
//!
//! Expressions serialize to the renderer's native JSON array form:
//!
//! ```json
//! ["match", ["to-string", ["get", "type"]], "forest", "#228b22", "#60a5fa"]
//! ["case", ["all", [">=", ["to-number", ["get", "pop"]], 0], ["<=", ["to-number", ["get", "pop"]], 10]], "#aaa", "#000"]
//! ```

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use super::{CategoryEntry, Channel, GraduatedRule};

// ============================================================================
// Expression
// ============================================================================

/// A data-driven paint expression evaluated per feature by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `["get", property]`: the raw feature property.
    Get(String),
    /// First-match on the string-coerced property value.
    Match(MatchExpression),
    /// First-match on numeric ranges of the property value.
    Case(CaseExpression),
}

/// `["match", ["to-string", ["get", property]], label, output, ..., fallback]`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchExpression {
    pub property: String,
    /// `(label, color)` pairs in evaluation order.
    pub branches: Vec<(String, String)>,
    pub fallback: String,
}

/// `["case", ["all", [">=", n, min], ["<=", n, max]], output, ..., fallback]`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpression {
    pub property: String,
    pub branches: Vec<RangeBranch>,
    pub fallback: String,
}

/// One inclusive `[min, max]` branch of a [`CaseExpression`].
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBranch {
    pub min: f64,
    pub max: f64,
    pub output: String,
}

impl RangeBranch {
    fn contains(&self, n: f64) -> bool {
        n >= self.min && n <= self.max
    }
}

impl Expression {
    /// Returns true if the expression has no branches and therefore always
    /// yields its fallback.
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Get(_) => false,
            Self::Match(m) => m.branches.is_empty(),
            Self::Case(c) => c.branches.is_empty(),
        }
    }

    /// Evaluates the expression against a feature's properties, with the
    /// renderer's coercion rules.
    ///
    /// `Get` yields the raw property (`null` when absent); `Match` and `Case`
    /// yield the output color of the first matching branch or the fallback.
    ///
    /// A `Case` input that does not read as a number yields the fallback.
    /// The renderer raises an evaluation error there instead and paints the
    /// property's own default, so this is an approximation for previews.
    pub fn evaluate(&self, properties: &Map<String, Value>) -> Value {
        match self {
            Self::Get(property) => properties.get(property).cloned().unwrap_or(Value::Null),
            Self::Match(m) => {
                let input = to_string(properties.get(&m.property));
                let output = m
                    .branches
                    .iter()
                    .find(|(label, _)| *label == input)
                    .map(|(_, color)| color)
                    .unwrap_or(&m.fallback);
                Value::String(output.clone())
            }
            Self::Case(c) => {
                let output = to_number(properties.get(&c.property))
                    .and_then(|n| c.branches.iter().find(|b| b.contains(n)))
                    .map(|b| &b.output)
                    .unwrap_or(&c.fallback);
                Value::String(output.clone())
            }
        }
    }

    /// Converts to the renderer's JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Get(property) => json!(["get", property]),
            Self::Match(m) => {
                let mut expr = vec![json!("match"), json!(["to-string", ["get", m.property]])];
                for (label, color) in &m.branches {
                    expr.push(json!(label));
                    expr.push(json!(color));
                }
                expr.push(json!(m.fallback));
                Value::Array(expr)
            }
            Self::Case(c) => {
                let number = json!(["to-number", ["get", c.property]]);
                let mut expr = vec![json!("case")];
                for branch in &c.branches {
                    expr.push(json!([
                        "all",
                        [">=", number, branch.min],
                        ["<=", number, branch.max]
                    ]));
                    expr.push(json!(branch.output));
                }
                expr.push(json!(c.fallback));
                Value::Array(expr)
            }
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// `to-string` coercion: null is empty, numbers print without a trailing
/// `.0`, objects and arrays print as JSON.
fn to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i128),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// `to-number` coercion: null is 0, booleans are 1/0, strings are parsed.
/// Returns `None` when the value cannot be read as a number.
fn to_number(value: Option<&Value>) -> Option<f64> {
    let n = match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse().ok()? }
        }
        Some(_) => return None,
    };
    n.is_finite().then_some(n)
}

// ============================================================================
// Builders
// ============================================================================

/// Builds a first-match expression keyed on the string-coerced `property`.
///
/// Entries without a color (absent or empty) are not emitted; unmatched
/// values resolve to `default_color`.
pub fn build_categorical_expression(
    property: &str,
    values: &[CategoryEntry],
    default_color: &str,
) -> Expression {
    let branches = values
        .iter()
        .filter_map(|entry| {
            entry
                .color()
                .map(|color| (entry.value.clone(), color.to_string()))
        })
        .collect();

    Expression::Match(MatchExpression {
        property: property.to_string(),
        branches,
        fallback: default_color.to_string(),
    })
}

/// Builds a first-match expression testing `min <= number(property) <= max`
/// for each rule, in order.
///
/// Rules with a missing or non-finite bound, or without a value for
/// `channel`, are skipped. No match resolves to `default_value`.
pub fn build_graduated_expression(
    property: &str,
    rules: &[GraduatedRule],
    channel: Channel,
    default_value: &str,
) -> Expression {
    let branches = rules
        .iter()
        .filter_map(|rule| {
            let (min, max) = rule.finite_range()?;
            let output = rule.color(channel)?;
            Some(RangeBranch {
                min,
                max,
                output: output.to_string(),
            })
        })
        .collect();

    Expression::Case(CaseExpression {
        property: property.to_string(),
        branches,
        fallback: default_value.to_string(),
    })
}

// ============================================================================
// PaintValue
// ============================================================================

/// A value assignable to a paint property.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintValue {
    Color(String),
    Number(f64),
    Expression(Expression),
}

impl PaintValue {
    /// Returns the literal color, if this is one.
    pub fn as_color(&self) -> Option<&str> {
        match self {
            Self::Color(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Resolves the value for one feature.
    pub fn evaluate(&self, properties: &Map<String, Value>) -> Value {
        match self {
            Self::Color(c) => Value::String(c.clone()),
            Self::Number(n) => json!(n),
            Self::Expression(e) => e.evaluate(properties),
        }
    }

    /// Converts to the renderer's JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Color(c) => json!(c),
            Self::Number(n) => json!(n),
            Self::Expression(e) => e.to_json(),
        }
    }
}

impl From<Expression> for PaintValue {
    /// Branchless `match`/`case` expressions collapse to their fallback
    /// color; the renderer rejects them otherwise.
    fn from(expr: Expression) -> Self {
        if !expr.is_constant() {
            return Self::Expression(expr);
        }
        match expr {
            Expression::Match(m) => Self::Color(m.fallback),
            Expression::Case(c) => Self::Color(c.fallback),
            get => Self::Expression(get),
        }
    }
}

impl From<f64> for PaintValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PaintValue {
    fn from(color: &str) -> Self {
        Self::Color(color.to_string())
    }
}

impl From<String> for PaintValue {
    fn from(color: String) -> Self {
        Self::Color(color)
    }
}

impl Serialize for PaintValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn entries(pairs: &[(&str, Option<&str>)]) -> Vec<CategoryEntry> {
        pairs
            .iter()
            .map(|(v, c)| CategoryEntry::new(*v, c.map(str::to_string)))
            .collect()
    }

    #[test]
    fn categorical_skips_empty_colors() {
        let expr = build_categorical_expression(
            "type",
            &entries(&[("forest", Some("#228b22")), ("water", Some("")), ("urban", None)]),
            "#999",
        );
        assert_eq!(
            expr.to_json(),
            json!(["match", ["to-string", ["get", "type"]], "forest", "#228b22", "#999"])
        );
    }

    #[test]
    fn categorical_matches_coerced_numbers() {
        let expr = build_categorical_expression(
            "code",
            &entries(&[("13", Some("red")), ("true", Some("blue"))]),
            "gray",
        );
        assert_eq!(expr.evaluate(&props(json!({"code": 13}))), json!("red"));
        assert_eq!(expr.evaluate(&props(json!({"code": 13.0}))), json!("red"));
        assert_eq!(expr.evaluate(&props(json!({"code": true}))), json!("blue"));
        assert_eq!(expr.evaluate(&props(json!({"code": "14"}))), json!("gray"));
        assert_eq!(expr.evaluate(&props(json!({}))), json!("gray"));
    }

    #[test]
    fn graduated_selects_first_matching_range() {
        let rules = vec![
            GraduatedRule::new(0.0, 10.0).with_fill("#aaa"),
            GraduatedRule::new(10.0, 100.0).with_fill("#bbb"),
        ];
        let expr = build_graduated_expression("pop", &rules, Channel::Fill, "#000");

        assert_eq!(expr.evaluate(&props(json!({"pop": 50}))), json!("#bbb"));
        // Overlapping boundary: first rule wins.
        assert_eq!(expr.evaluate(&props(json!({"pop": 10}))), json!("#aaa"));
        assert_eq!(expr.evaluate(&props(json!({"pop": "7"}))), json!("#aaa"));
        assert_eq!(expr.evaluate(&props(json!({"pop": 500}))), json!("#000"));
        assert_eq!(expr.evaluate(&props(json!({"pop": "n/a"}))), json!("#000"));
    }

    #[test]
    fn unreadable_case_input_yields_fallback() {
        let rules = vec![GraduatedRule::new(0.0, 10.0).with_fill("#aaa")];
        let expr = build_graduated_expression("pop", &rules, Channel::Fill, "#000");

        assert_eq!(expr.evaluate(&props(json!({"pop": "ten"}))), json!("#000"));
        assert_eq!(expr.evaluate(&props(json!({"pop": [1]}))), json!("#000"));
        assert_eq!(expr.evaluate(&props(json!({"pop": {"v": 1}}))), json!("#000"));
        // Null, missing and empty strings read as 0.
        assert_eq!(expr.evaluate(&props(json!({"pop": null}))), json!("#aaa"));
        assert_eq!(expr.evaluate(&props(json!({}))), json!("#aaa"));
        assert_eq!(expr.evaluate(&props(json!({"pop": " "}))), json!("#aaa"));
    }

    #[test]
    fn graduated_skips_invalid_rules() {
        let rules = vec![
            GraduatedRule::new(f64::NAN, 10.0).with_fill("#111"),
            GraduatedRule::new(0.0, f64::INFINITY).with_fill("#222"),
            GraduatedRule::new(0.0, 10.0).with_stroke("#333"),
            GraduatedRule::new(0.0, 10.0).with_fill(""),
            GraduatedRule::new(0.0, 10.0).with_fill("#444"),
        ];
        let expr = build_graduated_expression("pop", &rules, Channel::Fill, "#000");
        let Expression::Case(case) = &expr else {
            panic!("expected a case expression");
        };
        assert_eq!(case.branches.len(), 1);
        assert_eq!(case.branches[0].output, "#444");
    }

    #[test]
    fn case_serializes_to_renderer_form() {
        let rules = vec![GraduatedRule::new(0.0, 10.0).with_stroke("#aaa")];
        let expr = build_graduated_expression("pop", &rules, Channel::Stroke, "#000");
        let n = json!(["to-number", ["get", "pop"]]);
        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            json!(["case", ["all", [">=", n, 0.0], ["<=", n, 10.0]], "#aaa", "#000"])
        );
    }

    #[test]
    fn branchless_expressions_collapse_to_fallback() {
        let expr = build_graduated_expression("pop", &[], Channel::Fill, "#000");
        assert!(expr.is_constant());
        assert_eq!(PaintValue::from(expr), PaintValue::Color("#000".into()));

        let expr = build_categorical_expression("type", &[], "#123");
        assert!(expr.is_constant());
        assert_eq!(PaintValue::from(expr), PaintValue::Color("#123".into()));

        let expr = build_categorical_expression("type", &entries(&[("a", Some("#fff"))]), "#123");
        assert!(!expr.is_constant());
        assert!(matches!(PaintValue::from(expr), PaintValue::Expression(Expression::Match(_))));

        let get = Expression::Get("color".into());
        assert!(!get.is_constant());
        assert_eq!(PaintValue::from(get.clone()), PaintValue::Expression(get));
    }

    #[test]
    fn get_reads_raw_property() {
        let expr = Expression::Get("radius".into());
        assert_eq!(expr.evaluate(&props(json!({"radius": 12.5}))), json!(12.5));
        assert_eq!(expr.evaluate(&props(json!({}))), Value::Null);
        assert_eq!(expr.to_json(), json!(["get", "radius"]));
    }
}
