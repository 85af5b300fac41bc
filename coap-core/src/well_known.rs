//! `/.well-known/core` CoRE Link Format emitter (§4.11, RFC 6690).

/// One registered resource's link-format attributes.
#[derive(Debug, Clone)]
pub struct Link {
  /// Target URI, e.g. `/sensors/temp`.
  pub path: String,
  /// `rt=` resource-type attribute, if any.
  pub resource_type: Option<String>,
  /// `if=` interface-description attribute, if any.
  pub interface: Option<String>,
  /// `title=` attribute, if any.
  pub title: Option<String>,
  /// `sz=` maximum resource size estimate, if any.
  pub size: Option<u32>,
  /// Valueless attributes (e.g. `ed-r`, `ed-comb-req`) to render bare,
  /// without a trailing `=value`.
  pub flags: Vec<String>,
}

impl Link {
  /// A link with just a path, no attributes.
  pub fn new(path: impl Into<String>) -> Self {
    Self { path: path.into(),
           resource_type: None,
           interface: None,
           title: None,
           size: None,
           flags: Vec::new() }
  }

  /// Set the `rt=` attribute.
  pub fn resource_type(mut self, rt: impl Into<String>) -> Self {
    self.resource_type = Some(rt.into());
    self
  }

  /// Add a valueless attribute, rendered bare (no `=value`).
  pub fn flag(mut self, name: impl Into<String>) -> Self {
    self.flags.push(name.into());
    self
  }

  fn render(&self) -> String {
    let mut s = format!("<{}>", self.path);

    if let Some(rt) = &self.resource_type {
      s.push_str(&format!(";rt=\"{rt}\""));
    }
    if let Some(i) = &self.interface {
      s.push_str(&format!(";if=\"{i}\""));
    }
    if let Some(t) = &self.title {
      s.push_str(&format!(";title=\"{t}\""));
    }
    if let Some(sz) = self.size {
      s.push_str(&format!(";sz={sz}"));
    }
    for flag in &self.flags {
      s.push(';');
      s.push_str(flag);
    }

    s
  }

  fn matches(&self, filters: &[(String, Option<String>)]) -> bool {
    filters.iter().all(|(key, value)| match (key.as_str(), value) {
                    | ("rt", Some(v)) => self.resource_type.as_deref() == Some(v.as_str()),
                    | (k, None) => self.flags.iter().any(|f| f == k),
                    | _ => true,
                  })
  }
}

/// `</.well-known/edhoc>;rt=core.edhoc;ed-r[;ed-comb-req]`, synthesized when
/// EDHOC support is compiled in and no registered resource already declares
/// it.
pub fn edhoc_link(combined_request_supported: bool) -> Link {
  let mut link = Link::new("/.well-known/edhoc").resource_type("core.edhoc").flag("ed-r");
  if combined_request_supported {
    link = link.flag("ed-comb-req");
  }
  link
}

/// Parse a `Uri-Query` string list (each of the form `key=value` or bare
/// `key`) into filter predicates for [`render`].
pub fn parse_queries<'a>(queries: impl IntoIterator<Item = &'a str>) -> Vec<(String, Option<String>)> {
  queries.into_iter()
         .map(|q| match q.split_once('=') {
           | Some((k, v)) => (k.to_string(), Some(v.to_string())),
           | None => (q.to_string(), None),
         })
         .collect()
}

/// Render `links` (filtered by `filters`, as produced by [`parse_queries`])
/// as a CoRE Link Format (`application/link-format`) body.
///
/// If `edhoc` is `Some`, the rendered output is guaranteed to contain the
/// EDHOC well-known link exactly once — either a matching registered
/// resource's own declaration, or the synthesized default.
pub fn render(links: &[Link], filters: &[(String, Option<String>)], edhoc: Option<Link>) -> String {
  let mut rendered: Vec<&Link> = links.iter().filter(|l| l.matches(filters)).collect();

  let has_edhoc = rendered.iter().any(|l| l.path == "/.well-known/edhoc");
  let synth = edhoc.filter(|l| !has_edhoc && l.matches(filters));

  let mut out: Vec<String> = rendered.drain(..).map(Link::render).collect();
  if let Some(l) = synth {
    out.push(l.render());
  }

  out.join(",")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_rt_attribute() {
    let link = Link::new("/sensors/temp").resource_type("temperature");
    assert_eq!(link.render(), r#"</sensors/temp>;rt="temperature""#);
  }

  #[test]
  fn valueless_flags_render_bare() {
    let link = edhoc_link(true);
    assert_eq!(link.render(), r#"</.well-known/edhoc>;rt="core.edhoc";ed-r;ed-comb-req"#);
  }

  #[test]
  fn filters_by_resource_type() {
    let links = vec![Link::new("/a").resource_type("foo"), Link::new("/b").resource_type("bar")];
    let filters = parse_queries(["rt=foo"]);
    let out = render(&links, &filters, None);
    assert_eq!(out, r#"</a>;rt="foo""#);
  }

  #[test]
  fn synthesizes_edhoc_link_once() {
    let links = vec![Link::new("/sensors/temp")];
    let out = render(&links, &[], Some(edhoc_link(false)));
    assert!(out.contains("/.well-known/edhoc"));
    assert_eq!(out.matches("/.well-known/edhoc").count(), 1);
  }

  #[test]
  fn does_not_duplicate_existing_edhoc_declaration() {
    let links = vec![Link::new("/.well-known/edhoc").resource_type("core.edhoc").flag("ed-r")];
    let out = render(&links, &[], Some(edhoc_link(true)));
    assert_eq!(out.matches("/.well-known/edhoc").count(), 1);
    assert!(!out.contains("ed-comb-req"));
  }
}
