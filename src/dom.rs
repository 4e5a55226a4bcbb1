/// Opaque handle to a live element owned by the backing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Page-break hint attached to an element (`data-pdf-break` in markup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakHint {
    Before,
    After,
}

/// Layout properties captured before a temporary width override so they
/// can be restored afterwards.
#[derive(Debug, Clone, Default)]
pub struct StyleSnapshot {
    pub width: Option<String>,
    pub min_width: Option<String>,
    pub overflow: Option<String>,
}

/// Query surface of the backing document. Selector resolution returns
/// handles in document order. Implementations carry interior mutability
/// for the style override pair; the composer only mutates styles through
/// [`WidthOverride`] so every applied override is restored.
pub trait Dom {
    fn query_all(&self, selector: &str) -> Vec<ElementId>;

    fn query_first(&self, selector: &str) -> Option<ElementId> {
        self.query_all(selector).into_iter().next()
    }

    /// Direct children of the root container, or `None` when the root
    /// container itself is missing.
    fn root_children(&self) -> Option<Vec<ElementId>>;

    /// False for elements with zero effective display.
    fn is_rendered(&self, element: ElementId) -> bool;

    fn break_hint(&self, element: ElementId) -> Option<BreakHint>;

    fn override_width(&self, element: ElementId, width_px: f32) -> StyleSnapshot;

    fn restore_style(&self, element: ElementId, snapshot: StyleSnapshot);
}

/// Scoped width override: applies on construction, restores on drop, so
/// the element's original layout survives every exit path including a
/// rasterization failure.
pub struct WidthOverride<'a> {
    dom: &'a dyn Dom,
    element: ElementId,
    snapshot: Option<StyleSnapshot>,
}

impl<'a> WidthOverride<'a> {
    pub fn apply(dom: &'a dyn Dom, element: ElementId, width_px: f32) -> Self {
        let snapshot = dom.override_width(element, width_px);
        Self {
            dom,
            element,
            snapshot: Some(snapshot),
        }
    }
}

impl Drop for WidthOverride<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.dom.restore_style(self.element, snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingDom {
        log: RefCell<Vec<String>>,
    }

    impl Dom for RecordingDom {
        fn query_all(&self, _selector: &str) -> Vec<ElementId> {
            Vec::new()
        }

        fn root_children(&self) -> Option<Vec<ElementId>> {
            Some(Vec::new())
        }

        fn is_rendered(&self, _element: ElementId) -> bool {
            true
        }

        fn break_hint(&self, _element: ElementId) -> Option<BreakHint> {
            None
        }

        fn override_width(&self, element: ElementId, width_px: f32) -> StyleSnapshot {
            self.log
                .borrow_mut()
                .push(format!("override {} {}", element.0, width_px));
            StyleSnapshot {
                width: Some("auto".to_string()),
                ..StyleSnapshot::default()
            }
        }

        fn restore_style(&self, element: ElementId, snapshot: StyleSnapshot) {
            self.log.borrow_mut().push(format!(
                "restore {} {}",
                element.0,
                snapshot.width.as_deref().unwrap_or("")
            ));
        }
    }

    #[test]
    fn width_override_restores_on_drop() {
        let dom = RecordingDom {
            log: RefCell::new(Vec::new()),
        };
        {
            let _guard = WidthOverride::apply(&dom, ElementId(3), 756.0);
        }
        assert_eq!(
            *dom.log.borrow(),
            vec!["override 3 756".to_string(), "restore 3 auto".to_string()]
        );
    }

    #[test]
    fn width_override_restores_on_unwind() {
        let dom = RecordingDom {
            log: RefCell::new(Vec::new()),
        };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = WidthOverride::apply(&dom, ElementId(1), 100.0);
            panic!("raster blew up");
        }));
        assert!(result.is_err());
        assert_eq!(dom.log.borrow().len(), 2);
        assert!(dom.log.borrow()[1].starts_with("restore 1"));
    }
}
