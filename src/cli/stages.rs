use anyhow::Result;
use console::style;
use infersim::Stage;

pub fn cmd_stages() -> Result<()> {
    for stage in Stage::ALL {
        let meta = stage.metadata();
        println!("{:>2}. {}", stage.position(), style(meta.title).cyan().bold());
        println!("    {}", meta.description);
        println!("    {} {}", style("formula:").dim(), meta.formula);
        println!("    {} {}", style("analogy:").dim(), meta.analogy);
    }
    Ok(())
}
