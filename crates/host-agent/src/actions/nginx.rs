use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use common::api::{
    CreateNginxConfigPayload, DeleteNginxConfigPayload, NginxRoutePayload,
    UpdateNginxConfigPayload,
};
use tracing::info;

use crate::runtime::DynContainerRuntime;

/// Owns the local nginx site configs: renders them from route lists, writes
/// them under the conf dir, and restarts the sibling nginx container.
pub struct NginxManager {
    conf_dir: PathBuf,
    nginx_container: String,
    runtime: DynContainerRuntime,
}

impl NginxManager {
    pub fn new(conf_dir: impl Into<PathBuf>, nginx_container: String, runtime: DynContainerRuntime) -> Self {
        Self {
            conf_dir: conf_dir.into(),
            nginx_container,
            runtime,
        }
    }

    pub async fn apply_update(&self, payload: &UpdateNginxConfigPayload) -> anyhow::Result<String> {
        let config = render_site_config(
            &self.conf_dir,
            &payload.domain,
            payload.ssl_enabled,
            &payload.routes,
        );
        self.write_config(&payload.domain, &config)?;
        self.restart_nginx().await?;

        Ok(format!(
            "Nginx config for {} updated with {} routes",
            payload.domain,
            payload.routes.len()
        ))
    }

    pub async fn apply_create(&self, payload: &CreateNginxConfigPayload) -> anyhow::Result<String> {
        if payload.ssl {
            let key = payload
                .private_key
                .as_deref()
                .context("private_key is required when ssl is enabled")?;
            let cert = payload
                .public_key
                .as_deref()
                .context("public_key is required when ssl is enabled")?;
            self.write_ssl_material(&payload.domain, key, cert)?;
        }

        let routes = vec![NginxRoutePayload {
            path: "/".to_string(),
            container_name: payload.container_name.clone(),
            port: payload.port.clone(),
        }];
        let config = render_site_config(&self.conf_dir, &payload.domain, payload.ssl, &routes);
        self.write_config(&payload.domain, &config)?;
        self.restart_nginx().await?;

        Ok(format!("Nginx config for {} created", payload.domain))
    }

    pub async fn apply_delete(&self, payload: &DeleteNginxConfigPayload) -> anyhow::Result<String> {
        let config_path = self.config_path(&payload.domain);
        if config_path.exists() {
            std::fs::remove_file(&config_path)
                .with_context(|| format!("remove {}", config_path.display()))?;
        }

        let ssl_dir = self.ssl_dir(&payload.domain);
        if ssl_dir.exists() {
            std::fs::remove_dir_all(&ssl_dir)
                .with_context(|| format!("remove {}", ssl_dir.display()))?;
        }

        self.restart_nginx().await?;

        Ok(format!("Nginx config for {} removed", payload.domain))
    }

    /// Best-effort rewrite used by `start_container` when a `domain` is set:
    /// a single `/` route to the new container on port 80.
    pub async fn point_domain_at_container(
        &self,
        domain: &str,
        container_name: &str,
    ) -> anyhow::Result<()> {
        let routes = vec![NginxRoutePayload {
            path: "/".to_string(),
            container_name: container_name.to_string(),
            port: "80".to_string(),
        }];
        let config = render_site_config(&self.conf_dir, domain, false, &routes);
        self.write_config(domain, &config)?;
        self.restart_nginx().await
    }

    fn config_path(&self, domain: &str) -> PathBuf {
        self.conf_dir.join(format!("{domain}.conf"))
    }

    fn ssl_dir(&self, domain: &str) -> PathBuf {
        self.conf_dir.join(domain)
    }

    fn write_config(&self, domain: &str, config: &str) -> anyhow::Result<()> {
        create_dir_with_mode(&self.conf_dir, 0o755)?;
        let path = self.config_path(domain);
        write_file_with_mode(&path, config, 0o644)?;
        info!(domain, path = %path.display(), "nginx config written");
        Ok(())
    }

    fn write_ssl_material(&self, domain: &str, key: &str, cert: &str) -> anyhow::Result<()> {
        let dir = self.ssl_dir(domain);
        create_dir_with_mode(&dir, 0o755)?;
        write_file_with_mode(&dir.join("key.pem"), key, 0o600)?;
        write_file_with_mode(&dir.join("cert.pem"), cert, 0o644)?;
        Ok(())
    }

    async fn restart_nginx(&self) -> anyhow::Result<()> {
        self.runtime
            .restart_container(&self.nginx_container, None)
            .await
            .with_context(|| format!("restart nginx container {}", self.nginx_container))
    }
}

fn create_dir_with_mode(dir: &Path, mode: u32) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    set_mode(dir, mode)
}

fn write_file_with_mode(path: &Path, contents: &str, mode: u32) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

/// Renders one domain's site config. The non-SSL variant is a single port-80
/// server; the SSL variant adds the 80->443 redirect and terminates TLS with
/// material under `{conf_dir}/{domain}/`.
pub fn render_site_config(
    conf_dir: &Path,
    domain: &str,
    ssl_enabled: bool,
    routes: &[NginxRoutePayload],
) -> String {
    let mut out = String::new();

    if ssl_enabled {
        let _ = write!(
            out,
            "server {{\n    listen 80;\n    server_name {domain};\n\n    return 301 https://$host$request_uri;\n}}\n\nserver {{\n    listen 443 ssl;\n    server_name {domain};\n\n    ssl_certificate {conf}/{domain}/cert.pem;\n    ssl_certificate_key {conf}/{domain}/key.pem;\n    ssl_protocols TLSv1.2 TLSv1.3;\n",
            conf = conf_dir.display(),
        );
        for route in routes {
            out.push('\n');
            out.push_str(&render_location(route));
        }
        out.push_str("}\n");
    } else {
        let _ = write!(out, "server {{\n    listen 80;\n    server_name {domain};\n");
        for route in routes {
            out.push('\n');
            out.push_str(&render_location(route));
        }
        out.push_str("}\n");
    }

    out
}

fn render_location(route: &NginxRoutePayload) -> String {
    format!(
        "    location {path} {{\n        proxy_pass http://{container}:{port};\n        proxy_set_header Host $host;\n        proxy_set_header X-Real-IP $remote_addr;\n        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n        proxy_set_header X-Forwarded-Proto $scheme;\n    }}\n",
        path = route.path,
        container = route.container_name,
        port = route.port,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockRuntime;
    use std::sync::Arc;

    fn routes() -> Vec<NginxRoutePayload> {
        vec![
            NginxRoutePayload {
                path: "/".into(),
                container_name: "web".into(),
                port: "3000".into(),
            },
            NginxRoutePayload {
                path: "/api".into(),
                container_name: "api".into(),
                port: "8000".into(),
            },
        ]
    }

    #[test]
    fn plain_config_has_one_server_and_all_locations() {
        let config = render_site_config(Path::new("/etc/nginx/conf.d"), "x.example.com", false, &routes());

        assert_eq!(config.matches("server {").count(), 1);
        assert!(config.contains("listen 80;"));
        assert!(config.contains("server_name x.example.com;"));
        assert!(config.contains("location / {"));
        assert!(config.contains("proxy_pass http://web:3000;"));
        assert!(config.contains("location /api {"));
        assert!(config.contains("proxy_pass http://api:8000;"));
        assert!(config.contains("proxy_set_header X-Real-IP $remote_addr;"));
        assert!(!config.contains("ssl_certificate"));
    }

    #[test]
    fn ssl_config_adds_redirect_and_tls_block() {
        let config = render_site_config(Path::new("/etc/nginx/conf.d"), "x.example.com", true, &routes());

        assert_eq!(config.matches("server {").count(), 2);
        assert!(config.contains("return 301 https://$host$request_uri;"));
        assert!(config.contains("listen 443 ssl;"));
        assert!(config.contains("ssl_certificate /etc/nginx/conf.d/x.example.com/cert.pem;"));
        assert!(config.contains("ssl_certificate_key /etc/nginx/conf.d/x.example.com/key.pem;"));
        assert!(config.contains("ssl_protocols TLSv1.2 TLSv1.3;"));
        assert!(config.contains("proxy_pass http://web:3000;"));
    }

    #[tokio::test]
    async fn update_writes_config_and_restarts_nginx() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(MockRuntime::default());
        let manager = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        let message = manager
            .apply_update(&UpdateNginxConfigPayload {
                domain: "x.example.com".into(),
                ssl_enabled: false,
                routes: routes(),
            })
            .await
            .unwrap();
        assert!(message.contains("2 routes"));

        let written = std::fs::read_to_string(dir.path().join("x.example.com.conf")).unwrap();
        assert!(written.contains("server_name x.example.com;"));

        assert_eq!(runtime.restarted(), vec!["agent-nginx-1".to_string()]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join("x.example.com.conf"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[tokio::test]
    async fn ssl_create_writes_key_and_cert_with_modes() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(MockRuntime::default());
        let manager = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        manager
            .apply_create(&CreateNginxConfigPayload {
                domain: "x.example.com".into(),
                container_name: "web".into(),
                port: "3000".into(),
                ssl: true,
                private_key: Some("KEY".into()),
                public_key: Some("CERT".into()),
            })
            .await
            .unwrap();

        let key_path = dir.path().join("x.example.com/key.pem");
        let cert_path = dir.path().join("x.example.com/cert.pem");
        assert_eq!(std::fs::read_to_string(&key_path).unwrap(), "KEY");
        assert_eq!(std::fs::read_to_string(&cert_path).unwrap(), "CERT");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let key_mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
            let cert_mode = std::fs::metadata(&cert_path).unwrap().permissions().mode();
            assert_eq!(key_mode & 0o777, 0o600);
            assert_eq!(cert_mode & 0o777, 0o644);
        }
    }

    #[tokio::test]
    async fn ssl_create_without_material_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(MockRuntime::default());
        let manager = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime);

        let err = manager
            .apply_create(&CreateNginxConfigPayload {
                domain: "x.example.com".into(),
                container_name: "web".into(),
                port: "3000".into(),
                ssl: true,
                private_key: None,
                public_key: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("private_key"));
    }

    #[tokio::test]
    async fn delete_removes_config_and_ssl_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(MockRuntime::default());
        let manager = NginxManager::new(dir.path(), "agent-nginx-1".into(), runtime.clone());

        manager
            .apply_create(&CreateNginxConfigPayload {
                domain: "x.example.com".into(),
                container_name: "web".into(),
                port: "3000".into(),
                ssl: true,
                private_key: Some("KEY".into()),
                public_key: Some("CERT".into()),
            })
            .await
            .unwrap();

        manager
            .apply_delete(&DeleteNginxConfigPayload {
                domain: "x.example.com".into(),
            })
            .await
            .unwrap();

        assert!(!dir.path().join("x.example.com.conf").exists());
        assert!(!dir.path().join("x.example.com").exists());
        assert_eq!(runtime.restarted().len(), 2);
    }
}
