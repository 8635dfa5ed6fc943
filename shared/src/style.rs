use serde::{Deserialize, Serialize};

use crate::feature::Feature;

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// CSS color string for the Canvas 2D backend.
    pub fn css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }

    /// Normalized components for the GPU backend.
    pub fn to_f32(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a,
        ]
    }
}

/// A value a style expression can produce or match against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Color(Rgba),
}

impl Value {
    fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Color(_) => "color",
        }
    }
}

/// Which expression compiler a vector backend uses. The GPU backend compiles
/// expressions to shader code; the CPU backend interprets them per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleTarget {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StyleError {
    #[error("unknown feature property `{0}`")]
    UnknownProperty(String),
    #[error("{channel} resolved to {actual}, expected {expected}")]
    ChannelType {
        channel: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{target:?} style compiler rejects match with {cases} case(s); two or more required")]
    ShortMatch { target: StyleTarget, cases: usize },
}

/// Declarative style expression with match-first-case semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Read a feature property by name.
    Get(String),
    /// Compare `input` against each case value in order; first hit wins,
    /// otherwise `fallback`. The single-case form is valid here but rejected
    /// by the CPU compiler (see `validate`).
    Match {
        input: Box<Expr>,
        cases: Vec<(Value, Expr)>,
        fallback: Box<Expr>,
    },
}

impl Expr {
    pub fn get(key: &str) -> Self {
        Expr::Get(key.to_string())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn matching(
        input: Expr,
        cases: impl IntoIterator<Item = (Value, Expr)>,
        fallback: Expr,
    ) -> Self {
        Expr::Match {
            input: Box::new(input),
            cases: cases.into_iter().collect(),
            fallback: Box::new(fallback),
        }
    }

    /// Pure evaluation against one feature.
    pub fn eval(&self, feature: &Feature) -> Result<Value, StyleError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Get(key) => feature
                .property(key)
                .ok_or_else(|| StyleError::UnknownProperty(key.clone())),
            Expr::Match {
                input,
                cases,
                fallback,
            } => {
                let probe = input.eval(feature)?;
                for (case, result) in cases {
                    if probe.matches(case) {
                        return result.eval(feature);
                    }
                }
                fallback.eval(feature)
            }
        }
    }

    /// Check this expression against a backend's compiler limits.
    pub fn validate(&self, target: StyleTarget) -> Result<(), StyleError> {
        match self {
            Expr::Literal(_) | Expr::Get(_) => Ok(()),
            Expr::Match {
                input,
                cases,
                fallback,
            } => {
                if target == StyleTarget::Cpu && cases.len() < 2 {
                    return Err(StyleError::ShortMatch {
                        target,
                        cases: cases.len(),
                    });
                }
                input.validate(target)?;
                for (_, result) in cases {
                    result.validate(target)?;
                }
                fallback.validate(target)
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Rgba> for Value {
    fn from(v: Rgba) -> Self {
        Value::Color(v)
    }
}

/// One conditional style declaration. A feature takes the first rule whose
/// filter passes (or has no filter); later rules are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub filter: Option<Expr>,
    pub stroke_width: Expr,
    pub stroke_color: Expr,
    pub fill_color: Expr,
}

/// Fully evaluated visual parameters for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStyle {
    pub stroke_width: f64,
    pub stroke_color: Rgba,
    pub fill_color: Rgba,
}

fn number(channel: &'static str, value: Value) -> Result<f64, StyleError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(StyleError::ChannelType {
            channel,
            expected: "number",
            actual: other.type_name(),
        }),
    }
}

fn color(channel: &'static str, value: Value) -> Result<Rgba, StyleError> {
    match value {
        Value::Color(c) => Ok(c),
        other => Err(StyleError::ChannelType {
            channel,
            expected: "color",
            actual: other.type_name(),
        }),
    }
}

/// Resolve a rule set for one feature. `Ok(None)` means no rule matched and
/// the feature gets no explicit style (backends draw nothing for it).
pub fn resolve(rules: &[StyleRule], feature: &Feature) -> Result<Option<ResolvedStyle>, StyleError> {
    for rule in rules {
        if let Some(filter) = &rule.filter {
            match filter.eval(feature)? {
                Value::Bool(true) => {}
                Value::Bool(false) => continue,
                other => {
                    return Err(StyleError::ChannelType {
                        channel: "filter",
                        expected: "bool",
                        actual: other.type_name(),
                    });
                }
            }
        }
        return Ok(Some(ResolvedStyle {
            stroke_width: number("stroke-width", rule.stroke_width.eval(feature)?)?,
            stroke_color: color("stroke-color", rule.stroke_color.eval(feature)?)?,
            fill_color: color("fill-color", rule.fill_color.eval(feature)?)?,
        }));
    }
    Ok(None)
}

/// Validate a whole rule set against a backend's compiler.
pub fn validate_rules(rules: &[StyleRule], target: StyleTarget) -> Result<(), StyleError> {
    for rule in rules {
        if let Some(filter) = &rule.filter {
            filter.validate(target)?;
        }
        rule.stroke_width.validate(target)?;
        rule.stroke_color.validate(target)?;
        rule.fill_color.validate(target)?;
    }
    Ok(())
}

const HOVERED: f64 = 1.0;
const SELECTED: f64 = 2.0;

const STROKE_WIDTH: f64 = 1.0;
const STROKE_WIDTH_SELECTED: f64 = 5.0;

const STROKE_COLOR: Rgba = Rgba::new(0, 0, 255, 0.6);
const STROKE_COLOR_HOVER: Rgba = Rgba::new(0, 0, 255, 0.6);
const STROKE_COLOR_SELECTED: Rgba = Rgba::new(220, 85, 85, 1.0);

const FILL_COLOR: Rgba = Rgba::new(40, 40, 40, 0.1);
const FILL_COLOR_HOVER: Rgba = Rgba::new(40, 40, 40, 0.42);
const FILL_COLOR_SELECTED: Rgba = Rgba::new(220, 85, 85, 0.2);

fn hover_rule(filter: Option<Expr>) -> StyleRule {
    StyleRule {
        filter,
        // Single-case form: selected or default. The Cpu compiler rejects
        // this shape, which selecting the canvas backend makes visible.
        stroke_width: Expr::matching(
            Expr::get("hover"),
            [(Value::from(SELECTED), Expr::literal(STROKE_WIDTH_SELECTED))],
            Expr::literal(STROKE_WIDTH),
        ),
        stroke_color: Expr::matching(
            Expr::get("hover"),
            [
                (Value::from(SELECTED), Expr::literal(STROKE_COLOR_SELECTED)),
                (Value::from(HOVERED), Expr::literal(STROKE_COLOR_HOVER)),
            ],
            Expr::literal(STROKE_COLOR),
        ),
        fill_color: Expr::matching(
            Expr::get("hover"),
            [
                (Value::from(SELECTED), Expr::literal(FILL_COLOR_SELECTED)),
                (Value::from(HOVERED), Expr::literal(FILL_COLOR_HOVER)),
            ],
            Expr::literal(FILL_COLOR),
        ),
    }
}

/// The unfiltered rule set: every feature takes the hover-driven style.
pub fn common_rules() -> Vec<StyleRule> {
    vec![hover_rule(None)]
}

/// The filtered rule set: only `kind == "type2"` features are styled.
pub fn filtered_rules() -> Vec<StyleRule> {
    let filter = Expr::matching(
        Expr::get("kind"),
        [(Value::from("type2"), Expr::literal(true))],
        Expr::literal(false),
    );
    vec![hover_rule(Some(filter))]
}
