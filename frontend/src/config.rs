use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "IP", default = "127.0.0.1")]
    pub ip: String,

    #[envconfig(from = "PORT", default = "3000")]
    pub port: u16,

    pub processing_host: String,

    #[envconfig(default = "9000")]
    pub processing_port: u16,

    /// Accepted for compatibility with the original CLI surface but unused:
    /// the frontend is a single async process, there is no worker count to
    /// configure.
    #[envconfig(from = "WORKERS", default = "4")]
    pub workers: u32,

    #[envconfig(default = "1000")]
    pub max_tasks: usize,

    #[envconfig(default = "false")]
    pub verbose: bool,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
