use anyhow::{Context, Result};

use soup_lib::build::registry_file;
use soup_lib::config::SoupConfig;
use soup_lib::consts::CONFIG_FILENAME;
use soup_lib::platform::Platform;
use soup_lib::platform::paths::config_dir;

use crate::output::{print_stat, print_warning};

pub fn cmd_info() -> Result<()> {
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  let config = SoupConfig::load(&cwd).context("Failed to load configuration")?;

  println!("System:");
  match Platform::current() {
    Some(platform) => {
      print_stat("Platform", &platform.triple());
      print_stat("Architecture", platform.arch.as_str());
      print_stat("System", platform.os.as_str());
    }
    None => print_warning("Could not detect platform."),
  }

  println!();
  println!("Directories:");
  print_stat("Config", &config_dir().join(CONFIG_FILENAME).display().to_string());
  print_stat("User root", &config.roots.user_root.display().to_string());
  print_stat("Built-in packages", &config.roots.builtin_root.display().to_string());
  print_stat("File system state", &registry_file(&config.roots.state_root).display().to_string());

  println!();
  println!("Languages:");
  for (name, language) in &config.languages {
    print_stat(name, &format!("extension {}", language.extension));
  }
  print_stat("Host language", &config.host_language);
  Ok(())
}
