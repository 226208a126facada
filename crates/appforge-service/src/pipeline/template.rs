//! Starter file set written into uninitialized workspaces before any AI work.

use crate::workspace::{StoreError, WorkspaceStore};

const TEMPLATE_FILES: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "appforge-app",
  "private": true,
  "version": "0.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.3.1",
    "react-dom": "^18.3.1"
  },
  "devDependencies": {
    "@vitejs/plugin-react": "^4.3.1",
    "vite": "^5.4.1"
  }
}
"#,
    ),
    (
        "vite.config.js",
        r#"import { defineConfig } from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({
  plugins: [react()],
  server: {
    host: true,
  },
})
"#,
    ),
    (
        "index.html",
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>AppForge App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#,
    ),
    (
        "src/main.jsx",
        r#"import React from 'react'
import ReactDOM from 'react-dom/client'
import App from './App.jsx'
import './index.css'

ReactDOM.createRoot(document.getElementById('root')).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>,
)
"#,
    ),
    (
        "src/App.jsx",
        r#"function App() {
  return (
    <div className="app">
      <h1>Your app starts here</h1>
      <p>Describe what you want to build in the chat.</p>
    </div>
  )
}

export default App
"#,
    ),
    (
        "src/index.css",
        r#":root {
  font-family: system-ui, sans-serif;
  color: #213547;
}

.app {
  max-width: 640px;
  margin: 4rem auto;
  text-align: center;
}
"#,
    ),
];

/// Write the template into the workspace. Returns the created paths.
pub async fn materialize(store: &WorkspaceStore) -> Result<Vec<&'static str>, StoreError> {
    let mut created = Vec::with_capacity(TEMPLATE_FILES.len());
    for (path, contents) in TEMPLATE_FILES {
        store.write(path, contents).await?;
        created.push(*path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn materialize_writes_a_runnable_project_skeleton() {
        let tmp = TempDir::new().unwrap();
        let store = WorkspaceStore::open(tmp.path(), 1, 3).unwrap();

        let created = materialize(&store).await.unwrap();
        assert!(created.contains(&"package.json"));
        assert!(store.exists("package.json").await.unwrap());
        assert!(store.exists("src/App.jsx").await.unwrap());

        let manifest = store.read("package.json").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(parsed["scripts"]["dev"], "vite");
    }
}
