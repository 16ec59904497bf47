//! Scroll ancestor resolution.

use crate::host::{Host, NodeId, Target};

const OVERFLOW_PROPERTIES: [&str; 3] = ["overflow", "overflow-y", "overflow-x"];

/// Whether the node's computed overflow makes it a scroll container.
pub fn is_scrollable(host: &dyn Host, node: NodeId) -> bool {
    OVERFLOW_PROPERTIES.iter().any(|property| {
        host.computed_style(node, property)
            .is_some_and(|value| value.contains("scroll") || value.contains("auto"))
    })
}

/// Nearest scrollable ancestor of `element`, starting with the element itself.
///
/// The walk stops at the document root or at a detached subtree's top and
/// falls back to the window.
pub fn scroll_parent(host: &dyn Host, element: NodeId) -> Target {
    let mut current = Some(element);

    while let Some(node) = current {
        if host.is_document_root(node) {
            break;
        }
        let parent = host.parent(node);
        if parent.is_none() {
            break;
        }
        if is_scrollable(host, node) {
            return Target::Node(node);
        }
        current = parent;
    }

    Target::Window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Rect, Viewport};
    use crate::sim::SimHost;

    fn host() -> SimHost {
        SimHost::new(Viewport::new(800.0, 1000.0))
    }

    #[test]
    fn test_no_scrollable_ancestor_is_window() {
        let host = host();
        let body = host.add_root("body");
        let section = host.add_node("section", Some(body), Rect::default());
        let img = host.add_node("img", Some(section), Rect::default());

        assert_eq!(scroll_parent(&host, img), Target::Window);
    }

    #[test]
    fn test_nearest_scrollable_ancestor_wins() {
        let host = host();
        let body = host.add_root("body");
        let outer = host.add_node("outer", Some(body), Rect::default());
        host.set_overflow(outer, "scroll");
        let inner = host.add_node("inner", Some(outer), Rect::default());
        host.set_overflow(inner, "auto");
        let img = host.add_node("img", Some(inner), Rect::default());

        assert_eq!(scroll_parent(&host, img), Target::Node(inner));
    }

    #[test]
    fn test_scrollable_body_is_ignored() {
        let host = host();
        let body = host.add_root("body");
        host.set_overflow(body, "auto");
        let img = host.add_node("img", Some(body), Rect::default());

        assert_eq!(scroll_parent(&host, img), Target::Window);
    }

    #[test]
    fn test_orphan_element_is_window() {
        let host = host();
        let img = host.add_node("img", None, Rect::default());
        host.set_overflow(img, "scroll");

        assert_eq!(scroll_parent(&host, img), Target::Window);
    }

    #[test]
    fn test_overflow_axis_properties_count() {
        let host = host();
        let body = host.add_root("body");
        let list = host.add_node("list", Some(body), Rect::default());
        host.set_style(list, "overflow-y", "auto");

        assert!(is_scrollable(&host, list));
        assert!(!is_scrollable(&host, body));
    }
}
