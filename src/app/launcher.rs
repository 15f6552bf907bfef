use crate::app::{AppError, Result};
use crate::config::{AppConfig, AppKind};
use crate::types::{NodeIdx, NodeRecord};

const DEFAULT_JVM_OPTIONS: &[&str] = &[
    "-server",
    "-Djava.net.preferIPv4Stack=true",
    "-Djava.net.preferIPv6Addresses=false",
];

/// Builds the shell commands that start and probe one node.
///
/// The last start command must print the PID of the started process. The
/// first check command must print something if and only if the node runs.
pub trait NodeLauncher: Send + Sync {
    fn start_commands(&self, id: NodeIdx, node: &NodeRecord) -> Vec<String>;

    fn check_commands(&self, id: NodeIdx, node: &NodeRecord) -> Vec<String>;
}

pub struct JavaLauncher {
    jar: String,
    class_name: String,
    jvm_options: Vec<String>,
    args: Vec<String>,
}

impl JavaLauncher {
    pub fn new(jar: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            jar: jar.into(),
            class_name: class_name.into(),
            jvm_options: DEFAULT_JVM_OPTIONS.iter().map(|o| o.to_string()).collect(),
            args: Vec::new(),
        }
    }

    pub fn with_jvm_options(mut self, options: impl IntoIterator<Item = String>) -> Self {
        self.jvm_options.extend(options);
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Launcher options plus the node's own `jvm_options` option, if set.
    fn node_jvm_options(&self, node: &NodeRecord) -> String {
        let mut options = self.jvm_options.clone();
        match node.option("jvm_options") {
            Some(serde_json::Value::String(extra)) => options.push(extra.clone()),
            Some(serde_json::Value::Array(extra)) => {
                options.extend(extra.iter().filter_map(|v| v.as_str().map(str::to_string)))
            }
            _ => {}
        }
        options.join(" ")
    }
}

impl NodeLauncher for JavaLauncher {
    fn start_commands(&self, _id: NodeIdx, node: &NodeRecord) -> Vec<String> {
        let run_dir = node.run_dir.as_deref().unwrap_or(".");
        let log = node.log.as_deref().unwrap_or("/dev/null");

        let mut java = vec![
            "nohup java".to_string(),
            self.node_jvm_options(node),
            "-cp".to_string(),
            self.jar.clone(),
            self.class_name.clone(),
        ];
        java.extend(self.args.iter().cloned());
        let java = java.into_iter().filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ");

        vec![
            format!("mkdir -p {run_dir}"),
            format!("cd {run_dir}; {java} 1>{log} 2>&1 & echo $!"),
        ]
    }

    fn check_commands(&self, _id: NodeIdx, node: &NodeRecord) -> Vec<String> {
        vec![format!(
            "sleep 1; ps -p {} -f | grep java 2>/dev/null",
            node.pid.unwrap_or_default()
        )]
    }
}

/// Starts an arbitrary command line in the node's run directory.
pub struct ShellLauncher {
    command: String,
}

impl ShellLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl NodeLauncher for ShellLauncher {
    fn start_commands(&self, _id: NodeIdx, node: &NodeRecord) -> Vec<String> {
        let run_dir = node.run_dir.as_deref().unwrap_or(".");
        let log = node.log.as_deref().unwrap_or("/dev/null");
        vec![
            format!("mkdir -p {run_dir}"),
            format!("cd {run_dir}; nohup {} 1>{log} 2>&1 & echo $!", self.command),
        ]
    }

    fn check_commands(&self, _id: NodeIdx, node: &NodeRecord) -> Vec<String> {
        vec![format!("ps -p {} -o pid= 2>/dev/null", node.pid.unwrap_or_default())]
    }
}

/// Pick the launcher matching an application's configured kind.
pub fn launcher_for(name: &str, config: &AppConfig) -> Result<Box<dyn NodeLauncher>> {
    match config.kind {
        AppKind::Java => {
            let jar = config.jar.as_deref().ok_or_else(|| {
                AppError::MissingRequirement(format!("no jar configured for application '{name}'"))
            })?;
            let class_name = config.class_name.as_deref().ok_or_else(|| {
                AppError::MissingRequirement(format!("no class_name configured for application '{name}'"))
            })?;
            Ok(Box::new(
                JavaLauncher::new(jar, class_name)
                    .with_jvm_options(config.jvm_options.iter().cloned())
                    .with_args(config.args.iter().cloned()),
            ))
        }
        AppKind::Shell => {
            let command = config.command.as_deref().ok_or_else(|| {
                AppError::MissingRequirement(format!("no command configured for application '{name}'"))
            })?;
            let mut line = vec![command.to_string()];
            line.extend(config.args.iter().cloned());
            Ok(Box::new(ShellLauncher::new(line.join(" "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeRecord {
        NodeRecord::new("h1")
            .with_run_dir("/work/grid/server.0")
            .with_log("/work/node.0.grid.0.log")
            .with_pid(777)
    }

    #[test]
    fn test_java_start_commands() {
        let launcher = JavaLauncher::new("/libs/app.jar", "org.example.Main")
            .with_jvm_options(vec!["-Xmx512m".to_string()])
            .with_args(vec!["config.xml".to_string()]);

        let commands = launcher.start_commands(0, &node());

        assert_eq!(commands[0], "mkdir -p /work/grid/server.0");
        assert_eq!(
            commands[1],
            "cd /work/grid/server.0; nohup java -server -Djava.net.preferIPv4Stack=true \
             -Djava.net.preferIPv6Addresses=false -Xmx512m -cp /libs/app.jar org.example.Main config.xml \
             1>/work/node.0.grid.0.log 2>&1 & echo $!"
        );
        assert_eq!(launcher.check_commands(0, &node()), vec!["sleep 1; ps -p 777 -f | grep java 2>/dev/null"]);
    }

    #[test]
    fn test_node_jvm_option_override() {
        let launcher = JavaLauncher::new("a.jar", "Main");
        let mut node = node();
        node.extra.insert("jvm_options".to_string(), serde_json::json!(["-Dnode=1"]));

        assert!(launcher.start_commands(0, &node)[1].contains("-Djava.net.preferIPv6Addresses=false -Dnode=1 -cp"));
    }

    #[test]
    fn test_launcher_for_requires_jar() {
        let config = AppConfig::default();
        assert!(matches!(launcher_for("grid", &config), Err(AppError::MissingRequirement(_))));
    }

    #[test]
    fn test_shell_launcher_from_config() {
        let config = AppConfig {
            kind: AppKind::Shell,
            command: Some("./server.sh".to_string()),
            args: vec!["--port".to_string(), "9000".to_string()],
            ..Default::default()
        };
        let launcher = launcher_for("svc", &config).unwrap();
        assert_eq!(
            launcher.start_commands(1, &node())[1],
            "cd /work/grid/server.0; nohup ./server.sh --port 9000 1>/work/node.0.grid.0.log 2>&1 & echo $!"
        );
    }
}
