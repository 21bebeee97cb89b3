use anyhow::{bail, ensure};

use crate::{
    error::LogError,
    lifecycle::{Bean, BeanPhase},
};

/// Registers beans and moves them through the lifecycle together.
///
/// Beans start in registration order and stop or destroy in reverse, so a
/// bean registered after its dependencies is also torn down before them.
///
/// Like the beans it holds, the container does no locking of its own.
#[derive(Default)]
pub struct BeanContainer {
    beans: Vec<Box<dyn Bean>>,
}

impl BeanContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: Bean + 'static>(&mut self, bean: B) -> anyhow::Result<()> {
        self.register_boxed(Box::new(bean))
    }

    pub fn register_boxed(&mut self, bean: Box<dyn Bean>) -> anyhow::Result<()> {
        ensure!(
            self.get(bean.name()).is_none(),
            "A bean named {} is already registered",
            bean.name()
        );
        tracing::debug!("Registered bean {} ({})", bean.name(), bean.phase());
        self.beans.push(bean);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Bean> {
        self.beans
            .iter()
            .find(|bean| bean.name() == name)
            .map(|bean| &**bean)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Bean + 'static)> {
        self.beans
            .iter_mut()
            .find(|bean| bean.name() == name)
            .map(|bean| &mut **bean)
    }

    pub fn phase_of(&self, name: &str) -> Option<BeanPhase> {
        self.get(name).map(|bean| bean.phase())
    }

    /// Name and phase of every bean, in registration order.
    pub fn phases(&self) -> Vec<(String, BeanPhase)> {
        self.beans
            .iter()
            .map(|bean| (bean.name().to_string(), bean.phase()))
            .collect()
    }

    /// Starts every bean in registration order, stopping at the first
    /// failure. Beans after the failed one are left untouched.
    pub fn start_all(&mut self) -> anyhow::Result<()> {
        tracing::info!("Starting {} beans.", self.beans.len());
        for bean in self.beans.iter_mut() {
            bean.start()?;
        }
        tracing::info!("all {} beans are started", self.beans.len());
        Ok(())
    }

    /// Stops every bean in reverse registration order. A failure does not
    /// prevent the remaining beans from stopping.
    pub fn stop_all(&mut self) -> anyhow::Result<()> {
        tracing::info!("Stopping {} beans.", self.beans.len());
        self.in_reverse("stop", |bean| bean.stop())
    }

    /// Destroys every bean in reverse registration order, stopping each one
    /// first if needed. A failure does not prevent the remaining beans from
    /// being destroyed.
    pub fn destroy_all(&mut self) -> anyhow::Result<()> {
        tracing::info!("Destroying {} beans.", self.beans.len());
        self.in_reverse("destroy", |bean| bean.destroy())
    }

    fn in_reverse(
        &mut self,
        action: &str,
        f: impl Fn(&mut dyn Bean) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let mut failed = vec![];
        for bean in self.beans.iter_mut().rev() {
            let name = bean.name().to_string();
            if f(&mut **bean)
                .log_with_context(|| format!("Failed to {action} {name}"))
                .is_none()
            {
                failed.push(name);
            }
        }
        if !failed.is_empty() {
            bail!("Failed to {action} {} beans, see logs: {failed:?}", failed.len());
        }
        Ok(())
    }
}
