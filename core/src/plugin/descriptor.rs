use super::identity::PluginIdentity;

/// Immutable plug-in metadata, constructed once by the plug-in module and
/// handed to the registry. Weight governs load order: higher loads first,
/// ties broken by registration order.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    identity: PluginIdentity,
    name: String,
    version: String,
    description: String,
    config_prefix: String,
    weight: i32,
    dependencies: Vec<String>,
}

impl PluginDescriptor {
    pub fn builder(identity: PluginIdentity, name: impl Into<String>) -> PluginDescriptorBuilder {
        PluginDescriptorBuilder {
            identity,
            name: name.into(),
            version: String::new(),
            description: String::new(),
            config_prefix: String::new(),
            weight: 0,
            dependencies: Vec::new(),
        }
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn config_prefix(&self) -> &str {
        &self.config_prefix
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

pub struct PluginDescriptorBuilder {
    identity: PluginIdentity,
    name: String,
    version: String,
    description: String,
    config_prefix: String,
    weight: i32,
    dependencies: Vec<String>,
}

impl PluginDescriptorBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn config_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config_prefix = prefix.into();
        self
    }

    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn build(self) -> PluginDescriptor {
        PluginDescriptor {
            identity: self.identity,
            name: self.name,
            version: self.version,
            description: self.description,
            config_prefix: self.config_prefix,
            weight: self.weight,
            dependencies: self.dependencies,
        }
    }
}
