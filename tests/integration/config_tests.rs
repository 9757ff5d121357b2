use figment::Jail;
use fili::config::{Config, ConfigError, ConfigOverrides};
use std::path::{Path, PathBuf};

#[test]
fn test_file_values_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "fili.toml",
            r#"
            database = "/srv/index.db"
            batch_size = 64

            [exclusions]
            ignore_cache = false
            extra = ["/mnt/scratch"]
            "#,
        )?;

        let config = Config::load(Some(Path::new("fili.toml")), &ConfigOverrides::default())
            .map_err(|e| e.to_string())?;
        assert_eq!(config.database, PathBuf::from("/srv/index.db"));
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.io_threads, 4);
        assert!(!config.exclusions.ignore_cache);
        assert_eq!(config.exclusions.extra, vec![PathBuf::from("/mnt/scratch")]);
        assert!(!config.exclusions.virtual_fs.is_empty());
        Ok(())
    });
}

#[test]
fn test_environment_overrides_file_and_flags_override_environment() {
    Jail::expect_with(|jail| {
        jail.create_file("fili.toml", "io_threads = 2\nfastsum_length = 4\n")?;
        jail.set_env("FILI_IO_THREADS", "6");
        jail.set_env("FILI_EXCLUSIONS__IGNORE_CACHE", "false");
        jail.set_env("FILI_DATABASE", "/env/index.db");

        let overrides = ConfigOverrides {
            database: Some(PathBuf::from("/flag/index.db")),
            ..ConfigOverrides::default()
        };
        let config =
            Config::load(Some(Path::new("fili.toml")), &overrides).map_err(|e| e.to_string())?;
        assert_eq!(config.io_threads, 6);
        assert_eq!(config.fastsum_length, 4);
        assert!(!config.exclusions.ignore_cache);
        assert_eq!(config.database, PathBuf::from("/flag/index.db"));
        Ok(())
    });
}

#[test]
fn test_explicit_file_must_exist() {
    Jail::expect_with(|_jail| {
        let result = Config::load(Some(Path::new("absent.toml")), &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Load(_))));
        Ok(())
    });
}

#[test]
fn test_out_of_range_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("fili.toml", "fastsum_length = 0\n")?;
        let result = Config::load(Some(Path::new("fili.toml")), &ConfigOverrides::default());
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "fastsum_length",
                ..
            })
        ));

        jail.create_file("typed.toml", "io_threads = \"many\"\n")?;
        let result = Config::load(Some(Path::new("typed.toml")), &ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Load(_))));
        Ok(())
    });
}

#[test]
fn test_effective_config_renders_as_toml() {
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, Config::default());
}
