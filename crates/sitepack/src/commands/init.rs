//! Scaffold a new site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing sitepack...");

    let written = scaffold(Path::new("."), yes)?;

    if written == 0 {
        tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'sitepack dev' to start the development server.");

    Ok(())
}

/// Write the starter files under `root`.
///
/// Does nothing when `src/` exists unless `overwrite` is set. Returns the
/// number of files written.
pub fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    if root.join("src").exists() && !overwrite {
        return Ok(0);
    }

    let files = [
        ("site.toml", DEFAULT_CONFIG),
        ("src/_layout.jinja", DEFAULT_LAYOUT),
        ("src/_header.jinja", DEFAULT_HEADER),
        ("src/index.jinja", DEFAULT_INDEX),
        ("src/about/index.jinja", DEFAULT_ABOUT),
        ("src/style/style.scss", DEFAULT_STYLE),
        ("src/style/_base.scss", DEFAULT_BASE_STYLE),
        ("src/script/index.js", DEFAULT_SCRIPT),
    ];

    let mut written = 0;

    for (relative, content) in files {
        let path = root.join(relative);
        if path.exists() && !overwrite {
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
        written += 1;
    }

    fs::create_dir_all(root.join("src/image")).context("Failed to create src/image")?;

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# Sitepack Configuration

[site]
# Site title, available to templates as {{ site_title }}
title = "My Site"

# Template source directory
src = "src"

# Output directory for built site
output = "dist"

# "development" writes source maps, "production" minifies
mode = "development"

# Templates whose filename starts with this are partials, not pages
partial_prefix = "_"

[style]
entry = "src/style/style.scss"
output = "style/style.css"

[script]
entry = "src/script/index.js"
output = "script/main.js"

[[assets]]
from = "src/image"
to = "image"

[server]
port = 8080
open = true
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}{{ site_title }}{% endblock %}</title>
  {% if stylesheet %}<link rel="stylesheet" href="{{ stylesheet }}">{% endif %}
</head>
<body>
  {% include "_header.jinja" %}
  <main>
    {% block content %}{% endblock %}
  </main>
  {% if script %}<script src="{{ script }}"></script>{% endif %}
</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header class="site-header">
  <a href="{{ root }}index.html">{{ site_title }}</a>
  <nav>
    <a href="{{ root }}about/index.html">About</a>
  </nav>
</header>
"#;

const DEFAULT_INDEX: &str = r#"{% extends "_layout.jinja" %}

{% block content %}
<h1>Welcome</h1>
<p>Edit <code>src/index.jinja</code> and save to rebuild.</p>
{% endblock %}
"#;

const DEFAULT_ABOUT: &str = r#"{% extends "_layout.jinja" %}

{% block title %}About - {{ site_title }}{% endblock %}

{% block content %}
<h1>About</h1>
<p>Pages in subdirectories keep their path: this one is <code>{{ page }}</code>.</p>
{% endblock %}
"#;

const DEFAULT_STYLE: &str = r#"@use "base";

.site-header {
  display: flex;
  gap: base.$gap;
  align-items: center;
  user-select: none;

  a {
    color: base.$accent;
  }
}
"#;

const DEFAULT_BASE_STYLE: &str = r#"$gap: 1rem;
$accent: #336699;

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: system-ui, sans-serif;
  line-height: 1.6;
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.addEventListener('DOMContentLoaded', function () {
  console.log('Hello from sitepack');
});
"#;
