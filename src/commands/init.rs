use std::path::Path;

use crate::{
    InitArgs,
    build::{FieldValue, FrontMatter},
    config::{CONFIG_FILE_NAME, Config},
};

const BASE_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{% block title %}{{ site.title }}{% endblock %}</title>
  <link rel="stylesheet" href="{{ site.base_path | safe }}/assets/syntax.css">
</head>
<body>
  <header><a href="{{ site.base_path | safe }}/">{{ site.title }}</a></header>
  <main>{% block main %}{% endblock %}</main>
  {% if quire.live_reload %}
  <script>
    new EventSource("/_quire/live-reload").addEventListener("reload", () => location.reload());
  </script>
  {% endif %}
</body>
</html>
"#;

const POST_LAYOUT: &str = r#"{% extends "base.html" %}
{% block title %}{{ page.title }} | {{ site.title }}{% endblock %}
{% block main %}
<article>
  <h1>{{ page.title }}</h1>
  {% if page.date %}<time>{{ page.date }}</time>{% endif %}
  {{ content | safe }}
  {% if page.tag_links %}
  <ul class="tags">
    {% for tag in page.tag_links %}<li>{% if tag.url %}<a href="{{ tag.url | safe }}">{{ tag.name }}</a>{% else %}{{ tag.name }}{% endif %}</li>{% endfor %}
  </ul>
  {% endif %}
</article>
{% endblock %}
"#;

const HOME_LAYOUT: &str = r#"{% extends "base.html" %}
{% block main %}
<ul class="posts">
  {% for post in posts %}
  <li><time>{{ post.date }}</time> <a href="{{ post.url | safe }}">{{ post.title }}</a></li>
  {% endfor %}
</ul>
{% endblock %}
"#;

const LISTING_LAYOUT: &str = r#"{% extends "base.html" %}
{% block title %}{{ page.title }} | {{ site.title }}{% endblock %}
{% block main %}
<h1>{{ page.kind | capitalize }}: {{ page.name }}</h1>
<ul class="posts">
  {% for post in posts %}
  <li><a href="{{ post.url | safe }}">{{ post.title }}</a></li>
  {% endfor %}
</ul>
{% endblock %}
"#;

const WELCOME_POST: &str = r#"Your blog is set up. Edit this post in `content/`, or add a new
`YYYY-MM-DD-title.md` file next to it, then run `quire serve`.

```rust
fn main() {
    println!("Hello from Quire!");
}
```
"#;

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = if args.path.is_relative() {
        std::env::current_dir()?.join(&args.path)
    } else {
        args.path.clone()
    };

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            println!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    let config_file = path.join(CONFIG_FILE_NAME);
    if config_file.exists() {
        return Err(anyhow::anyhow!(
            "{config_file} already exists",
            config_file = config_file.display()
        ));
    }

    println!("Initializing project in {}", path.display());

    let config = Config::starter(&args.title);
    let config_text = serde_yaml::to_string(&config)?;
    tokio::fs::write(&config_file, config_text).await?;
    println!(
        "Created config file {config_file}",
        config_file = config_file.display()
    );

    let layouts = path.join(&config.layouts);
    for (name, contents) in [
        ("base", BASE_LAYOUT),
        (config.defaults.layout.as_str(), POST_LAYOUT),
        (config.listings.home_layout.as_str(), HOME_LAYOUT),
        (config.listings.tag_layout.as_str(), LISTING_LAYOUT),
        (config.listings.category_layout.as_str(), LISTING_LAYOUT),
    ] {
        write_new(&layouts.join(format!("{name}.html")), contents).await?;
    }

    let today = chrono::Local::now().date_naive();
    let front_matter = FrontMatter::from_entries([
        (
            "title".to_string(),
            FieldValue::Text(format!("Welcome to {}", args.title)),
        ),
        (
            "date".to_string(),
            FieldValue::Text(today.format("%Y-%m-%d").to_string()),
        ),
        ("tags".to_string(), FieldValue::List(vec!["meta".to_string()])),
    ]);
    let welcome = format!("{}{WELCOME_POST}", front_matter.to_block()?);
    let post_name = format!("{}-welcome.md", today.format("%Y-%m-%d"));
    write_new(&path.join(&config.content).join(post_name), &welcome).await?;

    println!("Run `quire serve` in {} to preview your blog", path.display());

    Ok(())
}

/// Write a starter file, leaving any existing file alone.
async fn write_new(path: &Path, contents: &str) -> Result<(), anyhow::Error> {
    if path.exists() {
        println!("Kept existing {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    println!("Created {}", path.display());
    Ok(())
}
