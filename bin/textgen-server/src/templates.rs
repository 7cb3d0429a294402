//! HTML templates, embedded at compile time.

use minijinja::Environment;

pub const INDEX: &str = "index.html";

pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(INDEX, include_str!("../templates/index.html"))?;
    Ok(env)
}

#[cfg(test)]
mod test {
    use minijinja::context;

    use super::*;

    #[test]
    fn index_renders_history_and_notice() {
        let env = environment().unwrap();
        let html = env
            .get_template(INDEX)
            .unwrap()
            .render(context! {
                chats => vec![context! {
                    prompt => "Explain <gravity>",
                    response => "Things fall.",
                    created_at => "2026-01-01T00:00:00Z",
                }],
                settings => context! { temperature => 0.7, top_p => 1.0, max_tokens => 200, model_path => "m.gguf" },
                notice => "Generation failed. See server logs for details.",
            })
            .unwrap();

        assert!(html.contains("Explain &lt;gravity&gt;"));
        assert!(html.contains("Things fall."));
        assert!(html.contains("Generation failed."));
    }
}
