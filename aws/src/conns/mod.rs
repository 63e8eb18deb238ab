//! AWS client state shared by every resource of a configured provider
//!
//! [`AwsClient`] owns the per-service client cache and the named mutex set.
//! Both are per provider instance, so independent providers (and tests) never
//! share clients or locks.

pub mod config;
pub mod mutexkv;

pub use config::{ClientConfig, ClientOverrides, Config, UsEast1RegionalEndpoint};
pub use mutexkv::MutexKv;

use crate::errs::{Error, Result};
use crate::names;
use crate::service::controltower::ControlTowerApi;
use crate::service::eks::EksApi;
use crate::service::wafregional::WafRegionalApi;
use crate::service::ServicePackageRegistry;
use crate::tags::{DefaultConfig, IgnoreConfig};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tfplug::Context;

type AnyClient = Arc<dyn Any + Send + Sync>;

/// Constructs a service's API client, then optionally post-processes it.
///
/// Both hooks are plain function values; a package without customization
/// simply leaves `customize_client` unset.
#[derive(Clone)]
pub struct ClientFactory {
    inner: Arc<dyn BuildClient>,
}

trait BuildClient: Send + Sync {
    fn build(&self, config: &ClientConfig) -> Result<AnyClient>;
}

type NewClientFn<T> = Box<dyn Fn(&ClientConfig) -> Result<T> + Send + Sync>;
type CustomizeClientFn<T> = Box<dyn Fn(T) -> Result<T> + Send + Sync>;

struct TypedFactory<T> {
    new_client: NewClientFn<T>,
    customize_client: Option<CustomizeClientFn<T>>,
}

impl<T: Send + Sync + 'static> BuildClient for TypedFactory<T> {
    fn build(&self, config: &ClientConfig) -> Result<AnyClient> {
        let client = (self.new_client)(config)?;
        let client = match &self.customize_client {
            Some(customize) => customize(client)?,
            None => client,
        };
        Ok(Arc::new(client))
    }
}

impl ClientFactory {
    pub fn new<T, F>(new_client: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ClientConfig) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(TypedFactory {
                new_client: Box::new(new_client),
                customize_client: None,
            }),
        }
    }

    pub fn with_customizer<T, F, C>(new_client: F, customize_client: C) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ClientConfig) -> Result<T> + Send + Sync + 'static,
        C: Fn(T) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(TypedFactory {
                new_client: Box::new(new_client),
                customize_client: Some(Box::new(customize_client)),
            }),
        }
    }

    fn build(&self, config: &ClientConfig) -> Result<AnyClient> {
        self.inner.build(config)
    }
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory").finish_non_exhaustive()
    }
}

pub struct AwsClient {
    sdk_config: SdkConfig,
    region: String,
    partition: &'static str,
    endpoints: BTreeMap<String, String>,
    s3_use_path_style: bool,
    s3_us_east_1_regional_endpoint: UsEast1RegionalEndpoint,
    default_tags: DefaultConfig,
    ignore_tags: IgnoreConfig,
    registry: Arc<ServicePackageRegistry>,
    conns: Mutex<HashMap<String, AnyClient>>,
    mutex_kv: MutexKv,
}

impl AwsClient {
    pub fn new(config: &Config, sdk_config: SdkConfig, registry: Arc<ServicePackageRegistry>) -> Self {
        Self {
            sdk_config,
            region: config.region.clone(),
            partition: names::partition_for_region(&config.region),
            endpoints: config.endpoints.clone(),
            s3_use_path_style: config.s3_use_path_style,
            s3_us_east_1_regional_endpoint: config.s3_us_east_1_regional_endpoint,
            default_tags: config.default_tags_config(),
            ignore_tags: config.ignore_tags_config(),
            registry,
            conns: Mutex::new(HashMap::new()),
            mutex_kv: MutexKv::new(),
        }
    }

    /// Resolves credentials and shared settings, then builds the client.
    pub async fn load(config: &Config, registry: Arc<ServicePackageRegistry>) -> Self {
        let sdk_config = load_sdk_config(config).await;
        Self::new(config, sdk_config, registry)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn partition(&self) -> &'static str {
        self.partition
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    pub fn default_tags_config(&self) -> &DefaultConfig {
        &self.default_tags
    }

    pub fn ignore_tags_config(&self) -> &IgnoreConfig {
        &self.ignore_tags
    }

    pub fn registry(&self) -> &Arc<ServicePackageRegistry> {
        &self.registry
    }

    pub fn mutex_kv(&self) -> &MutexKv {
        &self.mutex_kv
    }

    /// Base configuration for a service's client before any overrides.
    pub fn api_client_config(&self, service: &str) -> ClientConfig {
        ClientConfig {
            sdk_config: self.sdk_config.clone(),
            endpoint: self.endpoints.get(service).cloned(),
            region: self.region.clone(),
            s3_use_path_style: self.s3_use_path_style,
            s3_us_east_1_regional_endpoint: self.s3_us_east_1_regional_endpoint,
        }
    }

    /// Returns the API client for `service`.
    ///
    /// With empty overrides the default client is built at most once and
    /// then served from the cache; the cache lock is held across the lookup
    /// and construction. Overridden clients are always built fresh and never
    /// cached.
    pub fn conn<T>(&self, service: &str, overrides: &ClientOverrides) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let _span = tracing::debug_span!("conn", service_package = service).entered();

        if !overrides.is_empty() {
            let config = self.api_client_config(service).merge(overrides);
            let client = self.build_client(service, &config)?;
            return downcast::<T>(service, &client);
        }

        let mut conns = self.conns.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = conns.get(service) {
            return downcast::<T>(service, client);
        }

        let config = self.api_client_config(service);
        let client = self.build_client(service, &config)?;
        let typed = downcast::<T>(service, &client)?;
        conns.insert(service.to_string(), client);
        tracing::debug!(service_package = service, "cached default API client");

        Ok(typed)
    }

    fn build_client(&self, service: &str, config: &ClientConfig) -> Result<AnyClient> {
        let package = self
            .registry
            .get(service)
            .ok_or_else(|| Error::UnknownServicePackage(service.to_string()))?;
        let factory = package
            .client_factory()
            .ok_or_else(|| Error::NoClientFactory(service.to_string()))?;

        factory.build(config).map_err(|e| match e {
            e @ Error::ClientConstruction { .. } => e,
            other => Error::ClientConstruction {
                service: service.to_string(),
                message: other.to_string(),
            },
        })
    }

    pub fn acm_client(&self) -> Result<aws_sdk_acm::Client> {
        self.conn(names::ACM, &ClientOverrides::default())
    }

    pub fn lambda_client(&self) -> Result<aws_sdk_lambda::Client> {
        self.conn(names::LAMBDA, &ClientOverrides::default())
    }

    pub fn ecr_client(&self) -> Result<aws_sdk_ecr::Client> {
        self.conn(names::ECR, &ClientOverrides::default())
    }

    pub fn s3_client(&self) -> Result<aws_sdk_s3::Client> {
        self.conn(names::S3, &ClientOverrides::default())
    }

    /// An uncached S3 client that always uses path-style addressing.
    pub fn s3_client_path_style(&self) -> Result<aws_sdk_s3::Client> {
        self.conn(names::S3, &ClientOverrides::default().force_path_style(true))
    }

    pub fn controltower_api(&self) -> Result<Arc<dyn ControlTowerApi>> {
        self.conn(names::CONTROL_TOWER, &ClientOverrides::default())
    }

    pub fn wafregional_api(&self) -> Result<Arc<dyn WafRegionalApi>> {
        self.conn(names::WAF_REGIONAL, &ClientOverrides::default())
    }

    pub fn eks_api(&self) -> Result<Arc<dyn EksApi>> {
        self.conn(names::EKS, &ClientOverrides::default())
    }

    pub fn osis_client(&self) -> Result<aws_sdk_osis::Client> {
        self.conn(names::OSIS, &ClientOverrides::default())
    }

    pub fn datazone_client(&self) -> Result<aws_sdk_datazone::Client> {
        self.conn(names::DATA_ZONE, &ClientOverrides::default())
    }
}

fn downcast<T: Clone + 'static>(service: &str, client: &AnyClient) -> Result<T> {
    client
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::WrongClientType {
            service: service.to_string(),
            want: type_name::<T>(),
        })
}

/// Shared SDK configuration for every service client.
pub async fn load_sdk_config(config: &Config) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .retry_config(RetryConfig::standard().with_max_attempts(config.max_retries.max(1)));

    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

/// Runs an API call, abandoning it when the request context is cancelled.
pub async fn call<F, T, E>(ctx: &Context, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    tokio::select! {
        result = fut => result.map_err(Into::into),
        _ = ctx.cancelled() => Err(Error::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServicePackage, ServicePackageRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeClient {
        endpoint: Option<String>,
    }

    struct CountingPackage {
        built: Arc<AtomicUsize>,
    }

    impl ServicePackage for CountingPackage {
        fn service_package_name(&self) -> &'static str {
            "counting"
        }

        fn client_factory(&self) -> Option<ClientFactory> {
            let built = self.built.clone();
            Some(ClientFactory::new(move |config: &ClientConfig| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FakeClient {
                    endpoint: config.endpoint.clone(),
                }))
            }))
        }
    }

    struct NoFactoryPackage;

    impl ServicePackage for NoFactoryPackage {
        fn service_package_name(&self) -> &'static str {
            "nofactory"
        }
    }

    struct FailingPackage;

    impl ServicePackage for FailingPackage {
        fn service_package_name(&self) -> &'static str {
            "failing"
        }

        fn client_factory(&self) -> Option<ClientFactory> {
            Some(ClientFactory::new(|_: &ClientConfig| -> Result<Arc<FakeClient>> {
                Err(Error::Config("no credentials".into()))
            }))
        }
    }

    struct CustomizedPackage;

    impl ServicePackage for CustomizedPackage {
        fn service_package_name(&self) -> &'static str {
            "customized"
        }

        fn client_factory(&self) -> Option<ClientFactory> {
            Some(ClientFactory::with_customizer(
                |_: &ClientConfig| Ok(Arc::new(FakeClient { endpoint: None })),
                |_client: Arc<FakeClient>| {
                    Ok(Arc::new(FakeClient {
                        endpoint: Some("customized".into()),
                    }))
                },
            ))
        }
    }

    fn client() -> AwsClient {
        client_counting(Arc::new(AtomicUsize::new(0)))
    }

    fn client_counting(built: Arc<AtomicUsize>) -> AwsClient {
        let registry = ServicePackageRegistry::new(vec![
            Arc::new(CountingPackage { built }),
            Arc::new(NoFactoryPackage),
            Arc::new(FailingPackage),
            Arc::new(CustomizedPackage),
        ])
        .unwrap();
        let config = Config {
            region: "us-west-2".into(),
            ..Default::default()
        };
        AwsClient::new(&config, SdkConfig::builder().build(), Arc::new(registry))
    }

    #[test]
    fn default_client_is_built_once_and_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let client = client_counting(built.clone());

        let a: Arc<FakeClient> = client.conn("counting", &ClientOverrides::default()).unwrap();
        let b: Arc<FakeClient> = client.conn("counting", &ClientOverrides::default()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overridden_clients_are_never_cached() {
        let client = client();
        let overrides = ClientOverrides::default().endpoint("http://localhost:4566");

        let a: Arc<FakeClient> = client.conn("counting", &overrides).unwrap();
        let b: Arc<FakeClient> = client.conn("counting", &overrides).unwrap();
        let default: Arc<FakeClient> = client.conn("counting", &ClientOverrides::default()).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &default));
        assert_eq!(a.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(default.endpoint, None);
    }

    #[test]
    fn concurrent_default_requests_share_one_client() {
        let client = Arc::new(client());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                std::thread::spawn(move || {
                    client
                        .conn::<Arc<FakeClient>>("customized", &ClientOverrides::default())
                        .unwrap()
                })
            })
            .collect();

        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }

    #[test]
    fn customizer_is_applied() {
        let client = client();
        let c: Arc<FakeClient> = client.conn("customized", &ClientOverrides::default()).unwrap();
        assert_eq!(c.endpoint.as_deref(), Some("customized"));
    }

    #[test]
    fn errors_are_classified() {
        let client = client();

        let err = client
            .conn::<Arc<FakeClient>>("nope", &ClientOverrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownServicePackage(name) if name == "nope"));

        let err = client
            .conn::<Arc<FakeClient>>("nofactory", &ClientOverrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoClientFactory(_)));

        let err = client
            .conn::<Arc<FakeClient>>("failing", &ClientOverrides::default())
            .unwrap_err();
        assert!(
            matches!(err, Error::ClientConstruction { ref message, .. } if message.contains("no credentials"))
        );

        let _: Arc<FakeClient> = client.conn("counting", &ClientOverrides::default()).unwrap();
        let err = client
            .conn::<String>("counting", &ClientOverrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::WrongClientType { .. }));
    }

    #[tokio::test]
    async fn call_is_abandoned_on_cancellation() {
        let ctx = Context::new();
        ctx.cancel();
        let result: Result<()> = call(&ctx, std::future::pending::<std::result::Result<(), Error>>()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
