//! Service packages
//!
//! Each AWS service contributes a [`ServicePackage`]: its resources, how to
//! build its API client, how to tag its resources and its sweepers. The
//! provider builds one immutable [`ServicePackageRegistry`] from
//! [`service_packages_all`] when it starts.

pub mod acm;
pub mod controltower;
pub mod datazone;
pub mod ecr;
pub mod eks;
pub mod lambda;
pub mod osis;
pub mod s3legacy;
pub mod wafregional;

use crate::conns::{AwsClient, ClientFactory};
use crate::errs::{Error, Result};
use crate::sweep::SweeperRegistry;
use crate::tags::{self, TagService};
use std::collections::BTreeMap;
use std::sync::Arc;
use tfplug::{Resource, Schema};

/// How the tagging interceptor finds a resource's tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTags {
    /// State attribute holding the identifier passed to the tag API, e.g. `arn`
    pub identifier_attribute: &'static str,
    pub resource_type: Option<&'static str>,
}

#[derive(Clone)]
pub struct ResourceRegistration {
    pub type_name: &'static str,
    /// Human-readable name used in messages, e.g. "Landing Zone"
    pub name: &'static str,
    pub schema: fn() -> Schema,
    pub factory: fn(Arc<AwsClient>) -> Box<dyn Resource>,
    pub tags: Option<ResourceTags>,
}

impl std::fmt::Debug for ResourceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistration")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

pub trait ServicePackage: Send + Sync {
    fn service_package_name(&self) -> &'static str;

    fn resources(&self) -> Vec<ResourceRegistration> {
        Vec::new()
    }

    fn client_factory(&self) -> Option<ClientFactory> {
        None
    }

    fn tag_service(&self) -> Option<&dyn TagService> {
        None
    }

    fn register_sweepers(&self, _sweepers: &mut SweeperRegistry) -> Result<()> {
        Ok(())
    }
}

/// Every service package this provider ships.
pub fn service_packages_all() -> Vec<Arc<dyn ServicePackage>> {
    vec![
        Arc::new(acm::ServicePackage),
        Arc::new(controltower::ServicePackage),
        Arc::new(datazone::ServicePackage),
        Arc::new(ecr::ServicePackage),
        Arc::new(eks::ServicePackage),
        Arc::new(lambda::ServicePackage),
        Arc::new(osis::ServicePackage),
        Arc::new(s3legacy::ServicePackage),
        Arc::new(wafregional::ServicePackage),
    ]
}

pub struct ServicePackageRegistry {
    packages: BTreeMap<&'static str, Arc<dyn ServicePackage>>,
    resources: BTreeMap<&'static str, (ResourceRegistration, Arc<dyn ServicePackage>)>,
}

impl ServicePackageRegistry {
    pub fn new(packages: Vec<Arc<dyn ServicePackage>>) -> Result<Self> {
        let mut registry = Self {
            packages: BTreeMap::new(),
            resources: BTreeMap::new(),
        };

        for package in packages {
            let name = package.service_package_name();
            if registry.packages.contains_key(name) {
                return Err(Error::Registration(format!(
                    "duplicate service package: {}",
                    name
                )));
            }

            for resource in package.resources() {
                registry.register_resource(resource, &package)?;
            }
            registry.packages.insert(name, package);
        }

        tracing::debug!(
            packages = registry.packages.len(),
            resources = registry.resources.len(),
            "service packages registered"
        );
        Ok(registry)
    }

    fn register_resource(
        &mut self,
        resource: ResourceRegistration,
        package: &Arc<dyn ServicePackage>,
    ) -> Result<()> {
        let type_name = resource.type_name;
        if self.resources.contains_key(type_name) {
            return Err(Error::Registration(format!(
                "duplicate resource type: {}",
                type_name
            )));
        }

        if resource.tags.is_some() {
            if package.tag_service().is_none() {
                return Err(Error::Registration(format!(
                    "{}: tagged resource in service package {} without a tag service",
                    type_name,
                    package.service_package_name()
                )));
            }
            tags::check_tags_schema(type_name, &(resource.schema)())?;
        }

        self.resources
            .insert(type_name, (resource, Arc::clone(package)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServicePackage>> {
        self.packages.get(name)
    }

    pub fn resource(&self, type_name: &str) -> Option<(&ResourceRegistration, &Arc<dyn ServicePackage>)> {
        self.resources
            .get(type_name)
            .map(|(resource, package)| (resource, package))
    }

    pub fn packages(&self) -> impl Iterator<Item = &Arc<dyn ServicePackage>> {
        self.packages.values()
    }

    pub fn resource_type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Collects the sweepers of every package.
    pub fn sweepers(&self) -> Result<SweeperRegistry> {
        let mut sweepers = SweeperRegistry::new();
        for package in self.packages.values() {
            package.register_sweepers(&mut sweepers)?;
        }
        Ok(sweepers)
    }
}

impl std::fmt::Debug for ServicePackageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePackageRegistry")
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}
