// Namespace-agnostic XML element lookup.
//
// Cameras disagree wildly on namespace prefixes (`tt:`, `trt:`, `ns2:`,
// none at all), so elements are matched on their local name only. This is
// not a general XML parser: it handles the well-formed, comment-free
// documents ONVIF services return and nothing more.

use std::borrow::Cow;

/// A located element: its attribute text and its inner content.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    attrs: &'a str,
    inner: &'a str,
}

impl<'a> Element<'a> {
    /// Raw inner content (may contain child markup).
    pub fn inner(&self) -> &'a str {
        self.inner
    }

    /// Trimmed, entity-decoded text content.
    pub fn text(&self) -> Cow<'a, str> {
        unescape(self.inner.trim())
    }

    /// Attribute value by local name (`token`, `tt:token` both match `token`).
    pub fn attr(&self, name: &str) -> Option<Cow<'a, str>> {
        let mut rest = self.attrs;
        while let Some(eq) = rest.find('=') {
            let key = rest[..eq].trim();
            let key = key.rsplit(':').next().unwrap_or(key);
            let after = rest[eq + 1..].trim_start();
            let quote = after.chars().next()?;
            if quote != '"' && quote != '\'' {
                return None;
            }
            let value_and_rest = &after[1..];
            let end = value_and_rest.find(quote)?;
            if key == name {
                return Some(unescape(&value_and_rest[..end]));
            }
            rest = &value_and_rest[end + 1..];
        }
        None
    }

    pub fn child(&self, tag: &str) -> Option<Element<'a>> {
        find(self.inner, tag)
    }

    pub fn children(&self, tag: &str) -> Vec<Element<'a>> {
        find_all(self.inner, tag)
    }

    pub fn child_text(&self, tag: &str) -> Option<Cow<'a, str>> {
        self.child(tag).map(|el| el.text())
    }

    /// Child text parsed as a number; ONVIF sends integers as `25` or `25.0`.
    pub fn child_number(&self, tag: &str) -> Option<f64> {
        self.child_text(tag)?.trim().parse::<f64>().ok()
    }
}

/// First element with the given local name, searching depth-first in
/// document order.
pub fn find<'a>(xml: &'a str, tag: &str) -> Option<Element<'a>> {
    locate(xml, tag, 0).map(|(el, _)| el)
}

/// Every element with the given local name that is not nested inside an
/// earlier match.
pub fn find_all<'a>(xml: &'a str, tag: &str) -> Vec<Element<'a>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some((el, end)) = locate(xml, tag, from) {
        out.push(el);
        from = end;
    }
    out
}

/// Text of the first element with the given local name.
pub fn extract_text(xml: &str, tag: &str) -> Option<String> {
    find(xml, tag).map(|el| el.text().into_owned())
}

struct Tag<'a> {
    local: &'a str,
    attrs: &'a str,
    closing: bool,
    self_closing: bool,
    start: usize,
    end: usize,
}

fn next_tag(xml: &str, from: usize) -> Option<Tag<'_>> {
    let mut pos = from;
    loop {
        let start = pos + xml.get(pos..)?.find('<')?;
        let body_start = start + 1;
        let gt = body_start + xml[body_start..].find('>')?;
        let body = &xml[body_start..gt];
        pos = gt + 1;
        if body.starts_with('?') || body.starts_with('!') {
            continue;
        }
        let closing = body.starts_with('/');
        let body = body.trim_start_matches('/');
        let self_closing = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let name_end = body
            .find(|c: char| c.is_whitespace())
            .unwrap_or(body.len());
        let name = &body[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        return Some(Tag {
            local,
            attrs: &body[name_end..],
            closing,
            self_closing,
            start,
            end: gt + 1,
        });
    }
}

fn locate<'a>(xml: &'a str, tag: &str, from: usize) -> Option<(Element<'a>, usize)> {
    let mut pos = from;
    let open = loop {
        let t = next_tag(xml, pos)?;
        pos = t.end;
        if !t.closing && t.local == tag {
            break t;
        }
    };

    if open.self_closing {
        let el = Element {
            attrs: open.attrs,
            inner: "",
        };
        return Some((el, open.end));
    }

    let mut depth = 0usize;
    loop {
        let t = next_tag(xml, pos)?;
        pos = t.end;
        if t.local != tag || t.self_closing {
            continue;
        }
        if !t.closing {
            depth += 1;
        } else if depth == 0 {
            let el = Element {
                attrs: open.attrs,
                inner: &xml[open.end..t.start],
            };
            return Some((el, t.end));
        } else {
            depth -= 1;
        }
    }
}

/// Decode the five predefined XML entities.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

/// Escape text for inclusion in element content or attribute values.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: &str = r#"<?xml version="1.0"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
<env:Body><trt:GetProfilesResponse>
  <trt:Profiles token="main" fixed="true"><tt:Name>MainStream</tt:Name>
    <tt:VideoEncoderConfiguration token="enc0"><tt:Resolution><tt:Width>1920</tt:Width><tt:Height>1080</tt:Height></tt:Resolution></tt:VideoEncoderConfiguration>
  </trt:Profiles>
  <trt:Profiles token='sub'><tt:Name>Sub &amp; Co</tt:Name></trt:Profiles>
  <trt:Profiles token="empty"/>
</trt:GetProfilesResponse></env:Body></env:Envelope>"#;

    #[test]
    fn finds_all_sibling_elements() {
        let profiles = find_all(PROFILES, "Profiles");
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].attr("token").as_deref(), Some("main"));
        assert_eq!(profiles[1].attr("token").as_deref(), Some("sub"));
        assert_eq!(profiles[2].attr("token").as_deref(), Some("empty"));
        assert_eq!(profiles[2].inner(), "");
    }

    #[test]
    fn local_name_match_ignores_prefix_and_longer_names() {
        let width = find(PROFILES, "Width").map(|el| el.text().into_owned());
        assert_eq!(width.as_deref(), Some("1920"));
        assert!(find(PROFILES, "Profile").is_none());
    }

    #[test]
    fn nested_lookup_and_entities() {
        let profiles = find_all(PROFILES, "Profiles");
        let enc = profiles[0].child("VideoEncoderConfiguration");
        assert_eq!(enc.and_then(|e| e.attr("token")).as_deref(), Some("enc0"));
        assert_eq!(profiles[1].child_text("Name").as_deref(), Some("Sub & Co"));
        assert_eq!(
            profiles[0]
                .child("Resolution")
                .and_then(|r| r.child_number("Height")),
            Some(1080.0)
        );
    }

    #[test]
    fn same_name_nesting_matches_outer_close() {
        let xml = "<a:H264><b:H264>inner</b:H264><c:X>1</c:X></a:H264><d:X>2</d:X>";
        let outer = find(xml, "H264").map(|el| el.inner());
        assert_eq!(outer, Some("<b:H264>inner</b:H264><c:X>1</c:X>"));
        assert_eq!(find_all(xml, "X").len(), 2);
    }

    #[test]
    fn escape_round_trips() {
        let raw = r#"a&b<c>"d'"#;
        assert_eq!(unescape(&escape(raw)), raw);
    }
}
