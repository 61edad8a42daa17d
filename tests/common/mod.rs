//! Shared test helpers for integration tests

use codegrade::{Runtime, Value};

/// Run JavaScript code and return the result
#[allow(dead_code)]
pub fn run_js(code: &str) -> codegrade::Result<Value> {
    let mut runtime = Runtime::new();
    runtime.eval(code)
}

/// Run JavaScript, let the event loop drain, then evaluate `expression` in the
/// same runtime
#[allow(dead_code)]
pub fn run_then(code: &str, expression: &str) -> Value {
    let mut runtime = Runtime::new();
    runtime.eval(code).unwrap();
    runtime.eval(expression).unwrap()
}

/// A small page that passes every markup and accessibility check
#[allow(dead_code)]
pub const ACCESSIBLE_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Pancake recipes</title>
</head>
<body>
  <a href="#content">Skip to content</a>
  <header><h1>Pancakes</h1></header>
  <main id="content">
    <article>
      <h2>Ingredients</h2>
      <img src="pancakes.jpg" alt="A stack of pancakes">
      <form>
        <label for="servings">Servings</label>
        <input id="servings" type="number" name="servings">
        <button type="submit">Scale</button>
      </form>
    </article>
  </main>
  <footer><a href="/about">About the authors</a></footer>
</body>
</html>
"##;

/// A page with problems in every check group
#[allow(dead_code)]
pub const BROKEN_PAGE: &str = r#"<html>
<body>
  <div onclick="go()">Go</div>
  <img src="a.png">
  <h1>Title</h1>
  <h4>Skipped</h4>
  <input type="text">
  <a href="/x">click here</a>
  <p id="dup">one</p><p id="dup">two</p>
</body>
</html>
"#;

/// A tidy stylesheet
#[allow(dead_code)]
pub const CLEAN_CSS: &str = ":root {\n  --brand: #0a7;\n}\n\n.card {\n  color: var(--brand);\n  padding: 1rem;\n}\n";
