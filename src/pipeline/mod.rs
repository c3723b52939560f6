pub mod compiler;
pub mod frontmatter;
pub mod include;
pub mod types;
