use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "IP", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "PORT", default = "9000")]
    pub port: u16,

    /// Size of the job process pool. Defaults to the number of available
    /// CPUs, matching the original `multiprocessing.cpu_count()` default.
    #[envconfig(from = "PROCESSES", default = "0")]
    pub processes: usize,

    #[envconfig(from = "VERBOSE", default = "false")]
    pub verbose: bool,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn process_count(&self) -> usize {
        if self.processes > 0 {
            self.processes
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
