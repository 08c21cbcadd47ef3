#[cfg(test)]
pub const POST_DATA: &str = "title: What I learned after 20+ years of software development
date: 2022-04-02 12:05:00.000
updated: 2022-04-10

How to be a great software engineer?

I will divide this in parts, non-technical and technical

<!--more-->

## Non technical

You finished university and learned a lot. __The earlier you find that, the better.__
";

#[cfg(test)]
pub const POST_NO_MARKER: &str = "title: A post without marker
date: 2024-02-27 06:20:53

Short post, everything is the excerpt.
";
