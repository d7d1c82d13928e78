use crate::context_window::ContextLine;
use crate::explain::{
    ChatRole, ExplainChatMessage, ExplainChatSession, ExplainSnapshot, ExplainSortMode,
    OpenSessionArgs, SessionStatus, SessionVisibility, VisibilitySync,
};
use crate::model::{Act, CharacterSummary, Corpus, Line, Play, PlayViewState, Scene};
use crate::navigation::{LineView, NavigationSnapshot, PlaySummary, Selection};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;
use ts_rs::TS;

fn export_single_type<T: TS + 'static>(out_dir: &Path, index: &mut Vec<String>) -> Result<()> {
    T::export_all_to(out_dir).with_context(|| format!("failed to export {}", T::name()))?;
    let name = T::name();
    index.push(format!("export type {{ {name} }} from \"./{name}\";"));
    Ok(())
}

/// Write TypeScript declarations for every type the browser UI consumes,
/// plus an `index.ts` re-exporting them. Stale `.ts` files are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> Result<usize> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for entry in
        fs::read_dir(out_dir).with_context(|| format!("failed to list {}", out_dir.display()))?
    {
        let path = entry.context("failed to read directory entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }

    let mut index = Vec::new();
    export_single_type::<Line>(out_dir, &mut index)?;
    export_single_type::<Scene>(out_dir, &mut index)?;
    export_single_type::<Act>(out_dir, &mut index)?;
    export_single_type::<CharacterSummary>(out_dir, &mut index)?;
    export_single_type::<Play>(out_dir, &mut index)?;
    export_single_type::<Corpus>(out_dir, &mut index)?;
    export_single_type::<PlayViewState>(out_dir, &mut index)?;
    export_single_type::<Selection>(out_dir, &mut index)?;
    export_single_type::<PlaySummary>(out_dir, &mut index)?;
    export_single_type::<LineView>(out_dir, &mut index)?;
    export_single_type::<NavigationSnapshot>(out_dir, &mut index)?;
    export_single_type::<ContextLine>(out_dir, &mut index)?;
    export_single_type::<ChatRole>(out_dir, &mut index)?;
    export_single_type::<ExplainChatMessage>(out_dir, &mut index)?;
    export_single_type::<SessionStatus>(out_dir, &mut index)?;
    export_single_type::<SessionVisibility>(out_dir, &mut index)?;
    export_single_type::<ExplainSortMode>(out_dir, &mut index)?;
    export_single_type::<ExplainChatSession>(out_dir, &mut index)?;
    export_single_type::<OpenSessionArgs>(out_dir, &mut index)?;
    export_single_type::<VisibilitySync>(out_dir, &mut index)?;
    export_single_type::<ExplainSnapshot>(out_dir, &mut index)?;

    let index_path = out_dir.join("index.ts");
    let mut contents = index.join("\n");
    contents.push('\n');
    fs::write(&index_path, contents)
        .with_context(|| format!("failed to write {}", index_path.display()))?;

    info!(out_dir = %out_dir.display(), types = index.len(), "Exported TypeScript bindings");
    Ok(index.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn exports_declarations_and_index() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("folio_bindings_{nanos}"));
        fs::create_dir_all(&dir).expect("create out dir");
        fs::write(dir.join("Stale.ts"), "export type Stale = never;").expect("write stale");

        let count = export_ts_bindings(&dir).expect("export bindings");

        assert_eq!(count, 21);
        assert!(!dir.join("Stale.ts").exists());
        assert!(dir.join("Corpus.ts").exists());
        assert!(dir.join("ExplainChatSession.ts").exists());
        let index = fs::read_to_string(dir.join("index.ts")).expect("read index");
        assert!(index.contains("export type { NavigationSnapshot } from \"./NavigationSnapshot\";"));
        let _ = fs::remove_dir_all(dir);
    }
}
