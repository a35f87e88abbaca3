use std::fmt;

/// Book metadata extracted from a site's info page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoRecord {
    pub title: String,
    pub author: String,
    /// Categories or genres, in page order
    pub types: Vec<String>,
    /// Synopsis, possibly several paragraphs separated by newlines
    pub foreword: String,
    pub source_url: String,
    pub cover_image_url: Option<String>,
}

/// One chapter extracted from a chapter page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    pub index: u32,
    pub title: String,
    /// Chapter text, one paragraph per line
    pub content: String,
    pub source_url: String,
}

impl fmt::Display for InfoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title    : {}", self.title)?;
        writeln!(f, "Author   : {}", self.author)?;
        writeln!(f, "Types    : {}", self.types.join(", "))?;
        writeln!(f, "Source   : {}", self.source_url)?;
        if let Some(cover) = &self.cover_image_url {
            writeln!(f, "Cover    : {}", cover)?;
        } else {
            writeln!(f, "Cover    : None")?;
        }
        writeln!(f, "Foreword :")?;
        for line in self.foreword.lines() {
            writeln!(f, "> {}", line)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChapterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} lines, {})",
            self.index,
            self.title,
            self.content.lines().count(),
            self.source_url
        )
    }
}
