//! Server-rendered slider form.

use std::fmt::Write as _;

use housing_learning::{HousingInputs, INPUT_FIELDS};

/// What to show under the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing submitted yet.
    Empty,
    /// Formatted prediction.
    Value(String),
    /// Rejection message.
    Error(String),
}

/// Renders the full page with the sliders positioned at `inputs`.
pub fn render_page(inputs: &HousingInputs, outcome: &Outcome) -> String {
    let mut sliders = String::new();
    for (field, value) in INPUT_FIELDS.iter().zip(inputs.values()) {
        let _ = write!(
            sliders,
            r#"<div class="field">
  <label for="{key}">{label}</label>
  <input type="range" id="{key}" name="{key}" min="{min}" max="{max}" step="{step}" value="{value}"
         oninput="this.nextElementSibling.value = this.value">
  <output>{value}</output>
</div>
"#,
            key = field.key,
            label = escape(field.label),
            min = field.min,
            max = field.max,
            step = field.step,
        );
    }
    let result = match outcome {
        Outcome::Empty => String::new(),
        Outcome::Value(formatted) => format!(
            r#"<p class="result">Predicted median house value: <strong>{}</strong></p>"#,
            escape(formatted)
        ),
        Outcome::Error(message) => {
            format!(r#"<p class="error">Invalid input: {}</p>"#, escape(message))
        }
    };
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>California Housing Price Prediction</title>
<style>
  body {{ font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }}
  .field {{ display: grid; grid-template-columns: 16rem 1fr 5rem; gap: .5rem; margin: .4rem 0; }}
  .error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>California Housing Price Prediction</h1>
<form method="post" action="/predict">
{sliders}<button type="submit">Predict</button>
</form>
{result}
</body>
</html>
"#
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
