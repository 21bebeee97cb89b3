use anyhow::Context;

use crate::short_name;

mod phase;
pub use phase::BeanPhase;

/// The work a bean performs at each lifecycle transition.
///
/// Every hook defaults to doing nothing, so implementors only override the
/// phases they care about. Hooks are only ever invoked through a
/// [`Lifecycle`], which guarantees each one runs at most once.
pub trait LifecycleHooks {
    fn do_create(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_configure(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_destroy(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl LifecycleHooks for () {}

/// Drives a set of hooks forward through the bean phases.
///
/// Each transition is guarded by comparing the current phase to the
/// transition's "...ING" phase, so calling a transition that has already
/// happened (or been passed) does nothing.
///
/// If a hook fails, the bean is left in the transitional phase that was set
/// before the hook ran, and the error is returned. Since the guard sees that
/// transitional phase, retrying the same transition is a no-op.
///
/// There is no internal locking. Concurrent transitions on the same bean
/// must be serialized by the caller.
pub struct Lifecycle<H> {
    name: String,
    phase: BeanPhase,
    hooks: H,
}

impl<H: LifecycleHooks> Lifecycle<H> {
    /// Named after the hook type.
    pub fn new(hooks: H) -> Self {
        Self::named(short_name::<H>(), hooks)
    }

    pub fn named(name: impl Into<String>, hooks: H) -> Self {
        Self {
            name: name.into(),
            phase: BeanPhase::Disabled,
            hooks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> BeanPhase {
        self.phase
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn into_hooks(self) -> H {
        self.hooks
    }

    pub fn enable(&mut self) {
        if self.phase < BeanPhase::Enabled {
            self.set_phase(BeanPhase::Enabled);
        }
    }

    pub fn create(&mut self) -> anyhow::Result<()> {
        self.transition(BeanPhase::Creating, BeanPhase::Created, H::do_create)
    }

    pub fn configure(&mut self) -> anyhow::Result<()> {
        self.transition(BeanPhase::Configuring, BeanPhase::Configured, H::do_configure)
    }

    pub fn init(&mut self) -> anyhow::Result<()> {
        self.transition(BeanPhase::Initializing, BeanPhase::Initialized, H::do_init)
    }

    /// Initializes first if that has not happened yet.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.phase < BeanPhase::Starting {
            self.init()?;
            self.transition(BeanPhase::Starting, BeanPhase::Started, H::do_start)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> anyhow::Result<()> {
        self.transition(BeanPhase::Stopping, BeanPhase::Stopped, H::do_stop)
    }

    /// Stops first if that has not happened yet.
    pub fn destroy(&mut self) -> anyhow::Result<()> {
        if self.phase < BeanPhase::Destroying {
            self.stop()?;
            self.transition(BeanPhase::Destroying, BeanPhase::Destroyed, H::do_destroy)?;
        }
        Ok(())
    }

    fn transition(
        &mut self,
        running: BeanPhase,
        settled: BeanPhase,
        hook: fn(&mut H) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if self.phase >= running {
            tracing::trace!("{} is already {}, skipping {running}", self.name, self.phase);
            return Ok(());
        }
        self.set_phase(running);
        hook(&mut self.hooks).with_context(|| format!("{} failed while {running}", self.name))?;
        self.set_phase(settled);
        Ok(())
    }

    fn set_phase(&mut self, phase: BeanPhase) {
        tracing::debug!("{}: {} -> {phase}", self.name, self.phase);
        self.phase = phase;
    }
}

type Hook = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Lifecycle hooks supplied as closures.
///
/// ```rust
/// use femto_frame::lifecycle::{BeanPhase, FnHooks, Lifecycle};
///
/// let mut bean = Lifecycle::named(
///     "greeter",
///     FnHooks::new().on_start(|| {
///         println!("hello");
///         Ok(())
///     }),
/// );
/// bean.start().unwrap();
/// assert_eq!(BeanPhase::Started, bean.phase());
/// ```
#[derive(Default)]
pub struct FnHooks {
    create: Option<Hook>,
    configure: Option<Hook>,
    init: Option<Hook>,
    start: Option<Hook>,
    stop: Option<Hook>,
    destroy: Option<Hook>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, f: impl FnMut() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.create = Some(Box::new(f));
        self
    }

    pub fn on_configure(
        mut self,
        f: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.configure = Some(Box::new(f));
        self
    }

    pub fn on_init(mut self, f: impl FnMut() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.init = Some(Box::new(f));
        self
    }

    pub fn on_start(mut self, f: impl FnMut() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl FnMut() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.stop = Some(Box::new(f));
        self
    }

    pub fn on_destroy(mut self, f: impl FnMut() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.destroy = Some(Box::new(f));
        self
    }
}

fn call(hook: &mut Option<Hook>) -> anyhow::Result<()> {
    match hook {
        Some(f) => f(),
        None => Ok(()),
    }
}

impl LifecycleHooks for FnHooks {
    fn do_create(&mut self) -> anyhow::Result<()> {
        call(&mut self.create)
    }

    fn do_configure(&mut self) -> anyhow::Result<()> {
        call(&mut self.configure)
    }

    fn do_init(&mut self) -> anyhow::Result<()> {
        call(&mut self.init)
    }

    fn do_start(&mut self) -> anyhow::Result<()> {
        call(&mut self.start)
    }

    fn do_stop(&mut self) -> anyhow::Result<()> {
        call(&mut self.stop)
    }

    fn do_destroy(&mut self) -> anyhow::Result<()> {
        call(&mut self.destroy)
    }
}

/// Object-safe view of a [`Lifecycle`], so beans with different hook types
/// can be managed together.
pub trait Bean: Send {
    fn name(&self) -> &str;
    fn phase(&self) -> BeanPhase;
    fn enable(&mut self);
    fn create(&mut self) -> anyhow::Result<()>;
    fn configure(&mut self) -> anyhow::Result<()>;
    fn init(&mut self) -> anyhow::Result<()>;
    fn start(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
    fn destroy(&mut self) -> anyhow::Result<()>;
}

impl<H: LifecycleHooks + Send> Bean for Lifecycle<H> {
    fn name(&self) -> &str {
        Lifecycle::name(self)
    }

    fn phase(&self) -> BeanPhase {
        Lifecycle::phase(self)
    }

    fn enable(&mut self) {
        Lifecycle::enable(self)
    }

    fn create(&mut self) -> anyhow::Result<()> {
        Lifecycle::create(self)
    }

    fn configure(&mut self) -> anyhow::Result<()> {
        Lifecycle::configure(self)
    }

    fn init(&mut self) -> anyhow::Result<()> {
        Lifecycle::init(self)
    }

    fn start(&mut self) -> anyhow::Result<()> {
        Lifecycle::start(self)
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        Lifecycle::stop(self)
    }

    fn destroy(&mut self) -> anyhow::Result<()> {
        Lifecycle::destroy(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use parking_lot::Mutex;

    use super::*;

    /// Records the order in which hooks ran.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_on: Option<&'static str>,
    }

    impl Recorder {
        fn record(&mut self, hook: &'static str) -> anyhow::Result<()> {
            self.calls.push(hook);
            if self.fail_on == Some(hook) {
                bail!("{hook} exploded");
            }
            Ok(())
        }
    }

    impl LifecycleHooks for Recorder {
        fn do_create(&mut self) -> anyhow::Result<()> {
            self.record("create")
        }
        fn do_configure(&mut self) -> anyhow::Result<()> {
            self.record("configure")
        }
        fn do_init(&mut self) -> anyhow::Result<()> {
            self.record("init")
        }
        fn do_start(&mut self) -> anyhow::Result<()> {
            self.record("start")
        }
        fn do_stop(&mut self) -> anyhow::Result<()> {
            self.record("stop")
        }
        fn do_destroy(&mut self) -> anyhow::Result<()> {
            self.record("destroy")
        }
    }

    fn failing_on(hook: &'static str) -> Lifecycle<Recorder> {
        Lifecycle::new(Recorder {
            fail_on: Some(hook),
            ..Default::default()
        })
    }

    #[test]
    fn fresh_bean_is_disabled() {
        let bean = Lifecycle::new(Recorder::default());
        assert_eq!(BeanPhase::Disabled, bean.phase());
        assert_eq!("Recorder", bean.name());
    }

    #[test]
    fn start_runs_init_then_start_once() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.start().unwrap();
        assert_eq!(BeanPhase::Started, bean.phase());
        assert_eq!(vec!["init", "start"], bean.hooks().calls);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.start().unwrap();
        bean.start().unwrap();
        assert_eq!(vec!["init", "start"], bean.hooks().calls);
    }

    #[test]
    fn init_after_start_is_a_no_op() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.start().unwrap();
        bean.init().unwrap();
        assert_eq!(vec!["init", "start"], bean.hooks().calls);
    }

    #[test]
    fn destroy_stops_first() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.start().unwrap();
        bean.destroy().unwrap();
        assert_eq!(BeanPhase::Destroyed, bean.phase());
        assert_eq!(vec!["init", "start", "stop", "destroy"], bean.hooks().calls);
    }

    #[test]
    fn destroy_after_stop_does_not_stop_again() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.stop().unwrap();
        bean.destroy().unwrap();
        bean.destroy().unwrap();
        assert_eq!(vec!["stop", "destroy"], bean.hooks().calls);
    }

    #[test]
    fn nothing_leaves_destroyed() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.destroy().unwrap();
        bean.enable();
        bean.create().unwrap();
        bean.init().unwrap();
        bean.start().unwrap();
        bean.stop().unwrap();
        assert_eq!(BeanPhase::Destroyed, bean.phase());
        assert_eq!(vec!["stop", "destroy"], bean.hooks().calls);
    }

    #[test]
    fn full_forward_pass() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.enable();
        assert_eq!(BeanPhase::Enabled, bean.phase());
        bean.create().unwrap();
        assert_eq!(BeanPhase::Created, bean.phase());
        bean.configure().unwrap();
        assert_eq!(BeanPhase::Configured, bean.phase());
        bean.start().unwrap();
        bean.destroy().unwrap();
        assert_eq!(
            vec!["create", "configure", "init", "start", "stop", "destroy"],
            bean.hooks().calls
        );
    }

    #[test]
    fn configure_after_init_is_skipped() {
        let mut bean = Lifecycle::new(Recorder::default());
        bean.init().unwrap();
        bean.create().unwrap();
        bean.configure().unwrap();
        assert_eq!(BeanPhase::Initialized, bean.phase());
        assert_eq!(vec!["init"], bean.hooks().calls);
    }

    #[test]
    fn failed_hook_leaves_transitional_phase() {
        let mut bean = failing_on("init");
        let err = bean.start().unwrap_err();
        assert_eq!(BeanPhase::Initializing, bean.phase());
        assert!(bean.phase().is_running());
        assert!(format!("{err:#}").contains("init exploded"));
        assert!(err.to_string().contains("INITIALIZING"));
        // start hook never ran
        assert_eq!(vec!["init"], bean.hooks().calls);
    }

    #[test]
    fn failed_transition_is_not_retried() {
        let mut bean = failing_on("start");
        assert!(bean.start().is_err());
        assert_eq!(BeanPhase::Starting, bean.phase());
        bean.start().unwrap();
        assert_eq!(BeanPhase::Starting, bean.phase());
        assert_eq!(vec!["init", "start"], bean.hooks().calls);
    }

    #[test]
    fn failed_stop_blocks_destroy_hook() {
        let mut bean = failing_on("stop");
        bean.start().unwrap();
        assert!(bean.destroy().is_err());
        assert_eq!(BeanPhase::Stopping, bean.phase());
        assert_eq!(vec!["init", "start", "stop"], bean.hooks().calls);
    }

    #[test]
    fn closure_hooks_run_once_each() {
        let log = Arc::new(Mutex::new(vec![]));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        let mut bean = Lifecycle::named(
            "closures",
            FnHooks::new()
                .on_init(move || {
                    a.lock().push("init");
                    Ok(())
                })
                .on_stop(move || {
                    b.lock().push("stop");
                    Ok(())
                })
                .on_destroy(move || {
                    c.lock().push("destroy");
                    Ok(())
                }),
        );
        bean.start().unwrap();
        bean.destroy().unwrap();
        bean.destroy().unwrap();
        assert_eq!(vec!["init", "stop", "destroy"], *log.lock());
        assert_eq!("closures", bean.name());
    }

    #[test]
    fn beans_are_usable_as_trait_objects() {
        let mut beans: Vec<Box<dyn Bean>> = vec![
            Box::new(Lifecycle::new(Recorder::default())),
            Box::new(Lifecycle::named("unit", ())),
        ];
        for bean in beans.iter_mut() {
            bean.start().unwrap();
        }
        assert!(beans.iter().all(|b| b.phase() == BeanPhase::Started));
    }
}
