//! Generated cover and title pages.

use crate::book::BookMetadata;
use crate::util::{encode_href, escape_xml};

use super::toc::xhtml_head;

/// Full-page cover image. `image_href` is package-relative.
pub(crate) fn cover_page(metadata: &BookMetadata, image_href: &str, stylesheets: &[String]) -> String {
    let mut page = xhtml_head("Cover", &metadata.language, stylesheets);
    page.push_str(&format!(
        r#"<body epub:type="cover">
  <section class="cover" style="text-align: center; padding: 0; margin: 0;">
    <img src="../{}" alt="{}" style="max-width: 100%; max-height: 100%;"/>
  </section>
</body>
</html>
"#,
        escape_xml(&encode_href(image_href)),
        escape_xml(&metadata.title)
    ));
    page
}

/// Title, optional subtitle, author and publisher.
pub(crate) fn title_page(metadata: &BookMetadata, stylesheets: &[String]) -> String {
    let mut page = xhtml_head(&metadata.title, &metadata.language, stylesheets);
    page.push_str("<body epub:type=\"frontmatter\">\n  <section class=\"titlepage\" epub:type=\"titlepage\">\n");
    page.push_str(&format!(
        "    <h1 class=\"title\">{}</h1>\n",
        escape_xml(&metadata.title)
    ));
    if let Some(subtitle) = metadata.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
        page.push_str(&format!(
            "    <p class=\"subtitle\">{}</p>\n",
            escape_xml(subtitle)
        ));
    }
    page.push_str(&format!(
        "    <p class=\"author\">{}</p>\n    <p class=\"publisher\">{}</p>\n",
        escape_xml(&metadata.author),
        escape_xml(&metadata.publisher)
    ));
    page.push_str("  </section>\n</body>\n</html>\n");
    page
}
