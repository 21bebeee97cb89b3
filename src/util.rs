use std::sync::OnceLock;

use regex::Regex;

pub use private::Never;
mod private {
    /// A type that cannot be constructed. Use as a return type for functions
    /// that never return.
    pub struct Never(());
}

/// Type name without module paths, used to name beans, jobs and services in
/// the logs.
pub fn short_name<T: ?Sized>() -> String {
    abs_to_rel_paths(std::any::type_name::<T>())
}

fn abs_to_rel_paths(s: &str) -> String {
    static MODULE_PATH: OnceLock<Regex> = OnceLock::new();
    let re = MODULE_PATH
        .get_or_init(|| Regex::new("[_a-zA-Z0-9]*::").expect("module path pattern is valid"));
    re.replace_all(s, "").into()
}

#[test]
fn abs_to_rel_paths_works() {
    assert_eq!(
        "Lifecycle<ScheduledTask>",
        abs_to_rel_paths("femto_frame::lifecycle::Lifecycle<femto_frame::service::ScheduledTask>")
    );
    assert_eq!(
        "HashMap<String, Arc<dyn Job>>",
        abs_to_rel_paths("std::collections::hash::map::HashMap<alloc::string::String, alloc::sync::Arc<dyn femto_frame::service::Job>>")
    );
    assert_eq!(
        "(CronEntry, BeanPhase)",
        abs_to_rel_paths("(femto_frame::cron::entry::CronEntry, femto_frame::lifecycle::phase::BeanPhase)")
    );
    assert_eq!("FnHooks", abs_to_rel_paths("femto_frame::lifecycle::FnHooks"));
    assert_eq!("FieldMask", short_name::<crate::cron::FieldMask>());
}
