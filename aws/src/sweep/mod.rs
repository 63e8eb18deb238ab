//! Sweepers delete resources left behind by acceptance tests
//!
//! A sweeper lists what exists in a region and returns one [`Sweepable`] per
//! resource; [`sweep_orchestrator`] then deletes them concurrently.

use crate::conns::AwsClient;
use crate::errs::{is_not_found, ApiErrorKind, Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tfplug::resource::DeleteResourceRequest;
use tfplug::types::has_errors;
use tfplug::{AttributePath, Context, DynamicValue, Resource};
use tokio::sync::Semaphore;

/// Deletes running at once per sweeper
pub const SWEEP_CONCURRENCY: usize = 10;

#[async_trait]
pub trait Sweepable: Send + Sync {
    /// Identifier used in log messages.
    fn id(&self) -> &str;

    async fn delete(&self, ctx: &Context) -> Result<()>;
}

type DeleteFn = Box<dyn Fn(Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A resource deleted through a direct API call
pub struct SweepResource {
    id: String,
    delete: DeleteFn,
}

impl SweepResource {
    pub fn new<F, Fut>(id: impl Into<String>, delete: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            delete: Box::new(move |ctx| delete(ctx).boxed()),
        }
    }
}

#[async_trait]
impl Sweepable for SweepResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn delete(&self, ctx: &Context) -> Result<()> {
        (self.delete)(ctx.clone()).await
    }
}

/// A resource deleted through its provider resource implementation, with
/// just enough state to identify it.
pub struct ResourceSweeper {
    id: String,
    resource: Box<dyn Resource>,
    state: DynamicValue,
}

impl ResourceSweeper {
    pub fn new(resource: Box<dyn Resource>, attributes: &[(&str, &str)]) -> Result<Self> {
        let mut state = DynamicValue::object();
        for (name, value) in attributes {
            state.set_string(&AttributePath::new(name), *value)?;
        }
        let id = state
            .get_optional_string(&AttributePath::new("id"))
            .unwrap_or_default();

        Ok(Self {
            id,
            resource,
            state,
        })
    }
}

#[async_trait]
impl Sweepable for ResourceSweeper {
    fn id(&self) -> &str {
        &self.id
    }

    async fn delete(&self, ctx: &Context) -> Result<()> {
        let response = self
            .resource
            .delete(
                ctx.clone(),
                DeleteResourceRequest {
                    type_name: self.resource.type_name().to_string(),
                    prior_state: self.state.clone(),
                },
            )
            .await;

        if has_errors(&response.diagnostics) {
            let errors = response
                .diagnostics
                .iter()
                .filter(|d| d.is_error())
                .map(|d| Error::Message(d.to_string()))
                .collect();
            return Error::from_errors(errors);
        }
        Ok(())
    }
}

/// Deletes every sweepable, at most [`SWEEP_CONCURRENCY`] at a time.
/// Resources that are already gone count as deleted.
pub async fn sweep_orchestrator(ctx: &Context, sweepables: Vec<Box<dyn Sweepable>>) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(SWEEP_CONCURRENCY));

    let deletes = sweepables.iter().map(|sweepable| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await.map_err(|_| Error::Cancelled)?;
            tracing::info!(id = %sweepable.id(), "sweeping resource");

            match sweepable.delete(ctx).await {
                Err(err) if is_not_found(&err) => {
                    tracing::debug!(id = %sweepable.id(), "already deleted");
                    Ok(())
                }
                Err(err) => Err(err.context(format!("deleting {}", sweepable.id()))),
                Ok(()) => Ok(()),
            }
        }
    });

    let errors = futures::future::join_all(deletes)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();
    Error::from_errors(errors)
}

/// Errors meaning the service is not usable from this account or region,
/// rather than that sweeping failed.
pub fn skip_sweep_error(err: &Error) -> bool {
    const CODES: &[&str] = &[
        "AccessDenied",
        "AccessDeniedException",
        "InvalidAction",
        "OptInRequired",
        "SubscriptionRequiredException",
        "UnauthorizedOperation",
        "UnknownOperationException",
        "UnrecognizedClientException",
        "UnsupportedOperation",
    ];
    const MESSAGES: &[&str] = &[
        "is not subscribed",
        "is not supported in this region",
        "not available in this region",
        "Region is not supported",
        "Unsupported",
    ];

    // Services without an endpoint in the region fail DNS resolution.
    // Other dispatch failures (resets, timeouts) are real failures.
    const NO_SUCH_HOST: &[&str] = &[
        "dns error",
        "failed to lookup address",
        "no such host",
        "Name or service not known",
    ];

    let Some(api) = err.api_error() else {
        return false;
    };
    if api.kind == ApiErrorKind::Dispatch {
        return NO_SUCH_HOST.iter().any(|m| api.message().contains(m));
    }
    CODES.contains(&api.code()) || MESSAGES.iter().any(|m| api.message().contains(m))
}

type ListFn =
    Arc<dyn Fn(Context, Arc<AwsClient>) -> BoxFuture<'static, Result<Vec<Box<dyn Sweepable>>>> + Send + Sync>;

#[derive(Clone)]
pub struct Sweeper {
    pub name: &'static str,
    pub dependencies: Vec<&'static str>,
    list: ListFn,
}

impl Sweeper {
    pub async fn list(&self, ctx: &Context, client: Arc<AwsClient>) -> Result<Vec<Box<dyn Sweepable>>> {
        (self.list)(ctx.clone(), client).await
    }
}

impl fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sweeper")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweeperRegistry {
    sweepers: BTreeMap<&'static str, Sweeper>,
}

impl SweeperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `dependencies` are sweepers that must run before this one.
    pub fn register<F, Fut>(&mut self, name: &'static str, dependencies: &[&'static str], list: F) -> Result<()>
    where
        F: Fn(Context, Arc<AwsClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Box<dyn Sweepable>>>> + Send + 'static,
    {
        if self.sweepers.contains_key(name) {
            return Err(Error::Registration(format!("duplicate sweeper: {}", name)));
        }
        self.sweepers.insert(
            name,
            Sweeper {
                name,
                dependencies: dependencies.to_vec(),
                list: Arc::new(move |ctx, client| list(ctx, client).boxed()),
            },
        );
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sweepers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sweepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweepers.is_empty()
    }

    /// Sweepers in run order, dependencies first. With a filter only the
    /// named sweepers and what they depend on are returned.
    pub fn ordered(&self, filter: Option<&[String]>) -> Result<Vec<&Sweeper>> {
        let roots: Vec<&str> = match filter {
            Some(names) => {
                for name in names {
                    if !self.sweepers.contains_key(name.as_str()) {
                        return Err(Error::Registration(format!("unknown sweeper: {}", name)));
                    }
                }
                names.iter().map(String::as_str).collect()
            }
            None => self.sweepers.keys().copied().collect(),
        };

        let mut ordered = Vec::new();
        let mut done = BTreeSet::new();
        for root in roots {
            self.visit(root, &mut done, &mut Vec::new(), &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        done: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
        ordered: &mut Vec<&'a Sweeper>,
    ) -> Result<()> {
        let Some(sweeper) = self.sweepers.get(name) else {
            return Err(Error::Registration(format!(
                "sweeper {} depends on unknown sweeper {}",
                path.last().copied().unwrap_or_default(),
                name
            )));
        };
        if done.contains(sweeper.name) {
            return Ok(());
        }
        if path.contains(&sweeper.name) {
            return Err(Error::Registration(format!(
                "sweeper dependency cycle: {} -> {}",
                path.join(" -> "),
                name
            )));
        }

        path.push(sweeper.name);
        for dependency in &sweeper.dependencies {
            self.visit(dependency, done, path, ordered)?;
        }
        path.pop();

        done.insert(sweeper.name);
        ordered.push(sweeper);
        Ok(())
    }
}

#[derive(Debug)]
pub enum SweepOutcome {
    /// Number of resources deleted
    Swept(usize),
    /// The service is unavailable to this account or region.
    Skipped(String),
    Failed(Error),
}

#[derive(Debug)]
pub struct SweepReport {
    pub name: &'static str,
    pub outcome: SweepOutcome,
}

impl SweepReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, SweepOutcome::Failed(_))
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            SweepOutcome::Swept(count) => write!(f, "{}: swept {} resource(s)", self.name, count),
            SweepOutcome::Skipped(reason) => write!(f, "{}: skipped ({})", self.name, reason),
            SweepOutcome::Failed(err) => write!(f, "{}: failed: {}", self.name, err),
        }
    }
}

/// Runs the selected sweepers, dependencies first, against one region.
/// A failing sweeper does not stop the ones after it.
pub async fn run_sweepers(
    ctx: &Context,
    registry: &SweeperRegistry,
    client: Arc<AwsClient>,
    filter: Option<&[String]>,
) -> Result<Vec<SweepReport>> {
    let mut reports = Vec::new();
    for sweeper in registry.ordered(filter)? {
        tracing::info!(sweeper = %sweeper.name, region = %client.region(), "running sweeper");
        let outcome = match sweeper.list(ctx, client.clone()).await {
            Err(err) if skip_sweep_error(&err) => {
                tracing::warn!(sweeper = %sweeper.name, error = %err, "skipping sweeper");
                SweepOutcome::Skipped(err.to_string())
            }
            Err(err) => SweepOutcome::Failed(err.context(format!("listing {}", sweeper.name))),
            Ok(sweepables) => {
                let count = sweepables.len();
                match sweep_orchestrator(ctx, sweepables).await {
                    Ok(()) => SweepOutcome::Swept(count),
                    Err(err) => SweepOutcome::Failed(err),
                }
            }
        };
        reports.push(SweepReport {
            name: sweeper.name,
            outcome,
        });
    }
    Ok(reports)
}
