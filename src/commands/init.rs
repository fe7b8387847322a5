//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# devfolio configuration

# Site
title: My Portfolio
subtitle: ''
description: ''
author: John Doe
language: en
timezone: ''

# URL
url: http://localhost:4000
root: /

# Directory
source_dir: source
public_dir: public
data_dir: data

# Where posts live: `static` reads source/_posts, `local` uses data/db.json
backend: static

pagination:
  per_page: 10
  max_per_page: 50

featured_limit: 3

highlight:
  theme: base16-ocean.dark
  line_number: true

storage:
  media_dir: media
  public_url: /media
  temp_retention_hours: 24
  max_upload_bytes: 10485760

# The admin API is enabled once this variable holds a token
admin:
  token_env: DEVFOLIO_ADMIN_TOKEN

visitors:
  enabled: true

server:
  cors_origins: []
"#;

const PROFILE_TEMPLATE: &str = r#"name: John Doe
headline: Software Engineer
bio: |
  A few words about yourself.
email: john@example.com
links:
  - label: GitHub
    url: https://github.com/
current_focus:
  - Building things in Rust
experience:
  - company: Example Corp
    role: Backend Engineer
    period: 2022.03 - Present
    highlights:
      - Designed the event pipeline
    technologies: [Rust, Kafka]
projects:
  - title: devfolio
    description:
      - Portfolio and blog server
    technologies: [Rust, axum]
    period: 2024.01 - 2024.06
skills:
  - category: Languages
    items: [Rust, Kotlin]
education:
  - school: Example University
    degree: B.S. Computer Science
    period: 2014 - 2018
"#;

const INDEX_PLACEHOLDER: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>devfolio</title></head>
  <body><div id="root">Build the frontend into this directory.</div></body>
</html>
"#;

/// Initialize a new site in the given directory. Existing files are kept.
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir.join("source/_posts"))?;
    fs::create_dir_all(target_dir.join("source/_data"))?;
    fs::create_dir_all(target_dir.join("public"))?;

    write_if_missing(&target_dir.join("_config.yml"), CONFIG_TEMPLATE)?;
    write_if_missing(&target_dir.join("source/_data/profile.yml"), PROFILE_TEMPLATE)?;
    write_if_missing(&target_dir.join("public/index.html"), INDEX_PLACEHOLDER)?;

    let now = chrono::Local::now();
    let sample_post = format!(
        r#"---
title: Hello World
date: {}
tags: [welcome]
category: life
excerpt:
  - The first post on this site.
featured: true
---

Welcome! Edit this file under `source/_posts`, or switch `backend` to `local`
and write posts through the admin API.

<!-- more -->

## Quick Start

```bash
$ devfolio new "My New Post"
$ devfolio serve
```
"#,
        now.format("%Y-%m-%d %H:%M:%S")
    );
    write_if_missing(&target_dir.join("source/_posts/hello-world.md"), &sample_post)?;

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        tracing::info!("Keeping existing {:?}", path);
        return Ok(());
    }
    fs::write(path, content)?;
    Ok(())
}
