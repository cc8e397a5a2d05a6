use crate::options::StylingOptions;

const STYLING_PROMPT_TEMPLATE: &str = r#"TASK: High-end Virtual Barbershop Styling.
Perform a photorealistic hair and beard transformation on the person in the image.

NEW STYLE SPECIFICATIONS:
- Hairstyle: {hairstyle}
- Beard/Facial Hair: {beard_style}
- Primary Color: {color}

TECHNICAL REQUIREMENTS:
1. Maintain 100% fidelity to the person's original facial structure, skin tone, eye color, and background.
2. The hair and beard must look naturally grown from the scalp and skin, with realistic lighting, shadows, and texture.
3. If the style is "Bald" or "Clean Shaven", the exposed skin must look smooth and natural.
4. Blend the colors naturally; avoid a flat or painted-on look.
5. Output exactly one modified image part."#;

pub fn build_styling_prompt(options: &StylingOptions) -> String {
    STYLING_PROMPT_TEMPLATE
        .replace("{hairstyle}", options.hairstyle.label())
        .replace("{beard_style}", options.beard_style.label())
        .replace("{color}", options.color.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BeardStyle, Hairstyle};

    #[test]
    fn embeds_all_three_option_values() {
        let options = StylingOptions::new(Hairstyle::Mohawk, BeardStyle::VanDyke, " #112233 ");
        let prompt = build_styling_prompt(&options);
        assert!(prompt.contains("- Hairstyle: Mohawk"));
        assert!(prompt.contains("- Beard/Facial Hair: Van Dyke"));
        assert!(prompt.contains("- Primary Color: #112233"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn carries_fidelity_constraints() {
        let prompt = build_styling_prompt(&StylingOptions::default());
        assert!(prompt.contains("facial structure"));
        assert!(prompt.contains("Blend the colors naturally"));
        assert!(prompt.contains("texture"));
        assert!(prompt.contains("exactly one modified image"));
    }
}
