//! Generates the `index.html` that lets users browse a downloaded package in
//! a browser.

use std::fmt::{self, Write};

use crate::data::{AssetFormat, Formats, Package};

pub const INDEX_FILE_NAME: &str = "index.html";

const STYLE: &str = r#"
body, html {
    padding: 0;
    margin: 0;
    background-color: #f5f5f5;
    font-family: "Lato", "Lucida Grande", "Lucida Sans Unicode", Tahoma, sans-serif;
    color: #444;
}
h1 {
    font-size: 2.2em;
    margin-bottom: 0;
}
h4 {
    font-size: 1.3em;
    margin-top: 1em;
    color: #555;
}
.content {
    width: 720px;
    margin: 0 auto;
    text-align: center;
}
.content header {
    padding: 1em 0;
    text-align: left;
}
.flow {
    width: 100%;
    text-align: left;
    display: none;
    margin: 2em 0;
}
.sticker {
    width: 24%;
    display: inline-block;
    margin: 10px 0;
    transition: all 0.25s;
    border-radius: 2px;
}
.sticker:hover {
    box-shadow: 0 0 10px 0 rgba(0, 0, 0, 0.15);
}
.sticker img {
    width: 100%;
    height: auto;
}
.tab {
    display: none;
}
.tab + label {
    padding: 0.5em 1em;
    font-size: 1.2em;
    border: 1px solid #d5d5d5;
    border-radius: 7px;
    margin: 0 3px;
    cursor: pointer;
}
.tab:checked + label {
    background-color: #444;
    color: #f5f5f5;
    border-color: transparent;
}
.tab:checked:nth-of-type(1) ~ .flow:nth-of-type(1),
.tab:checked:nth-of-type(2) ~ .flow:nth-of-type(2),
.tab:checked:nth-of-type(3) ~ .flow:nth-of-type(3) {
    display: block;
}
"#;

/// Renders the viewer page for `package`, with one tab per enabled format.
pub fn render_index(package: &Package, formats: Formats) -> String {
    let mut output = String::new();
    write_index(&mut output, package, formats).expect("writing to a String cannot fail");
    output
}

fn write_index<W: Write>(output: &mut W, package: &Package, formats: Formats) -> fmt::Result {
    let title = escape(package.title());

    writeln!(output, "<!DOCTYPE html>")?;
    writeln!(output, "<html lang=\"en\">")?;
    writeln!(output, "<head>")?;
    writeln!(output, "<meta charset=\"utf-8\">")?;
    writeln!(output, "<title>{title} - LINE Stickers</title>")?;
    writeln!(
        output,
        "<link href=\"https://fonts.googleapis.com/css?family=Lato\" rel=\"stylesheet\" type=\"text/css\">"
    )?;
    writeln!(output, "<style>{STYLE}</style>")?;
    writeln!(output, "</head>")?;
    writeln!(output, "<body>")?;
    writeln!(output, "<div class=\"content\">")?;
    writeln!(output, "<header>")?;
    writeln!(output, "<h1>{} - {}</h1>", package.package_id, title)?;
    writeln!(output, "<h4>{}</h4>", escape(package.author()))?;
    writeln!(output, "</header>")?;

    // Tabs first, galleries after: the stylesheet pairs the n-th tab with the
    // n-th gallery through sibling selectors.
    for (index, format) in formats.viewer_order().enumerate() {
        let checked = if index == 0 { " checked" } else { "" };
        writeln!(
            output,
            "<input type=\"radio\" id=\"{format}\" name=\"formatTab\" class=\"tab\"{checked}>"
        )?;
        writeln!(output, "<label for=\"{format}\">{format}</label>")?;
    }

    for format in formats.viewer_order() {
        write_gallery(output, package, format)?;
    }

    writeln!(output, "</div>")?;
    writeln!(output, "</body>")?;
    writeln!(output, "</html>")
}

fn write_gallery<W: Write>(output: &mut W, package: &Package, format: AssetFormat) -> fmt::Result {
    writeln!(output, "<div class=\"flow\" format=\"{format}\">")?;
    for sticker in &package.stickers {
        writeln!(output, "<div class=\"sticker\" title=\"{}\">", sticker.id)?;
        write!(
            output,
            "<img src=\"./{}/{}\"",
            format.dir_name(),
            format.file_name(sticker.id)
        )?;
        // The stylesheet scales images to the grid, the attributes only keep
        // the aspect ratio while images load.
        if sticker.width > 0 && sticker.height > 0 {
            write!(
                output,
                " width=\"{}\" height=\"{}\"",
                sticker.width, sticker.height
            )?;
        }
        writeln!(output, ">")?;
        writeln!(output, "</div>")?;
    }
    writeln!(output, "</div>")
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        serde_json::from_str(
            r#"{
                "packageId": 42,
                "title": {"en": "Cats & <Dogs>"},
                "author": {"en": "Someone"},
                "stickers": [{"id": 1}, {"id": 2}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn escapes_title_and_author() {
        let html = render_index(
            &package(),
            Formats {
                png: true,
                apng: false,
                gif: false,
            },
        );

        assert!(html.contains("<h1>42 - Cats &amp; &lt;Dogs&gt;</h1>"));
        assert!(html.contains("<h4>Someone</h4>"));
        assert!(!html.contains("<Dogs>"));
    }

    #[test]
    fn lists_only_enabled_formats() {
        let html = render_index(
            &package(),
            Formats {
                png: true,
                apng: false,
                gif: true,
            },
        );

        assert!(html.contains("<img src=\"./GIF/1.gif\">"));
        assert!(html.contains("<img src=\"./PNG/2.png\">"));
        assert!(!html.contains("./APNG/"));
        assert!(html.contains("id=\"GIF\" name=\"formatTab\" class=\"tab\" checked>"));
        assert!(html.contains("id=\"PNG\" name=\"formatTab\" class=\"tab\">"));
    }

    #[test]
    fn images_carry_known_dimensions() {
        let package: Package = serde_json::from_str(
            r#"{"packageId": 1, "stickers": [{"id": 3, "width": 120, "height": 96}, {"id": 4}]}"#,
        )
        .unwrap();

        let html = render_index(
            &package,
            Formats {
                png: true,
                apng: false,
                gif: false,
            },
        );

        assert!(html.contains("<img src=\"./PNG/3.png\" width=\"120\" height=\"96\">"));
        assert!(html.contains("<img src=\"./PNG/4.png\">"));
    }

    #[test]
    fn galleries_follow_sticker_order() {
        let html = render_index(
            &package(),
            Formats {
                png: false,
                apng: true,
                gif: false,
            },
        );

        let first = html.find("./APNG/1.png").unwrap();
        let second = html.find("./APNG/2.png").unwrap();
        assert!(first < second);
    }
}
