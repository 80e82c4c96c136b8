//! Channel configuration for orchestrator communication

/// Channel buffer configuration for orchestrator communication
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Report channel buffer size (workers -> orchestrator)
    pub report_buffer: usize,

    /// Command broadcast capacity (handle -> orchestrator)
    pub command_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            report_buffer: 10_000,
            command_buffer: 16,
        }
    }
}

impl ChannelConfig {
    /// Create a new channel config with custom report buffer size
    pub fn with_report_buffer(mut self, size: usize) -> Self {
        self.report_buffer = size.max(1);
        self
    }

    /// Create a new channel config with custom command capacity
    pub fn with_command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.report_buffer, 10_000);
        assert_eq!(config.command_buffer, 16);
    }

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfig::default()
            .with_report_buffer(5000)
            .with_command_buffer(0);
        assert_eq!(config.report_buffer, 5000);
        assert_eq!(config.command_buffer, 1);
    }
}
