use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use ramhorns::Template;
use thiserror::Error;

use crate::text_utils::{format_date_time, slugify};

pub const DEFAULT_NEW_POST_TEMPLATE: &str = "title: {{{yaml_title}}}
slug: {{{slug}}}
date: {{{date}}}

# {{{title}}}

<!--more-->
";

#[derive(Debug, Error)]
pub enum NewPostError {
    #[error("Error parsing post template: {0}")]
    Template(String),

    #[error("Title cannot be written as front-matter: {0}")]
    Title(#[from] serde_yaml::Error),

    #[error("Title \"{0}\" produces an empty slug")]
    EmptySlug(String),

    #[error("Post file {} already exists", .0.display())]
    Exists(PathBuf),

    #[error("Error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(ramhorns::Content)]
struct NewPost<'a> {
    title: &'a str,
    yaml_title: &'a str,
    slug: &'a str,
    date: &'a str,
}

/// Renders `template` for a post called `title`. Returns the slug and the file content.
pub fn render_new_post(template: &str, title: &str, now: &NaiveDateTime) -> Result<(String, String), NewPostError> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(NewPostError::EmptySlug(title.to_string()));
    }

    // Titles like "Rust: part 1" must be quoted to stay valid front-matter
    let yaml_title = serde_yaml::to_string(title)?;
    let date = format_date_time(now);

    let tpl = Template::new(template).map_err(|e| NewPostError::Template(e.to_string()))?;
    let mut rendered = tpl.render(&NewPost {
        title,
        yaml_title: yaml_title.trim_end(),
        slug: &slug,
        date: &date,
    });

    // ramhorns drops the trailing whitespace, which may hold the front-matter separator
    let trailing = &template[template.trim_end().len()..];
    rendered.truncate(rendered.trim_end().len());
    rendered.push_str(trailing);

    Ok((slug, rendered))
}

/// Writes `<dir>/<slug>.md`. An existing file is never replaced.
pub fn create_post_file(dir: &Path, template: &str, title: &str, now: &NaiveDateTime) -> Result<PathBuf, NewPostError> {
    let (slug, content) = render_new_post(template, title, now)?;
    let path = dir.join(format!("{}.md", slug));

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(NewPostError::Exists(path)),
        Err(source) => return Err(NewPostError::Io { path, source }),
    };
    if let Err(source) = file.write_all(content.as_bytes()) {
        return Err(NewPostError::Io { path, source });
    }

    Ok(path)
}
