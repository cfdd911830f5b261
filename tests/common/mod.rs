//! Shared test fixtures for the integration suites.
//!
//! Import via `mod common;` from any test file under tests/.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;
use std::sync::Once;

use waypoint::{
    Container, ContainerKey, Instance, NavigationController, NavigationKey, TypeDescriptor,
};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per process so `--nocapture` shows spans.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A plain screen with no result expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenKey(pub &'static str);

impl NavigationKey for ScreenKey {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A dialog that produces a `String` answer.
#[derive(Debug, Clone)]
pub struct PromptKey {
    pub question: &'static str,
}

impl NavigationKey for PromptKey {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn expected_result(&self) -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<String>())
    }
}

/// A picker that produces an `i64` selection.
#[derive(Debug, Clone)]
pub struct PickerKey;

impl NavigationKey for PickerKey {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn expected_result(&self) -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<i64>())
    }
}

/// A confirmation sheet whose only "result" is having been closed.
#[derive(Debug, Clone)]
pub struct ConfirmKey;

impl NavigationKey for ConfirmKey {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn expected_result(&self) -> Option<TypeDescriptor> {
        Some(TypeDescriptor::of::<()>())
    }
}

/// A controller plus its root container, the common starting point.
pub fn root_container() -> (NavigationController, Arc<Container>) {
    init_tracing();
    let controller = NavigationController::new();
    let container = controller.new_container(ContainerKey::new("root"), None);
    (controller, container)
}

/// Names of the screens currently on the stack, for assertions.
pub fn screen_names(stack: &[Instance]) -> Vec<&'static str> {
    stack
        .iter()
        .filter_map(|instance| instance.key_as::<ScreenKey>().map(|key| key.0))
        .collect()
}
