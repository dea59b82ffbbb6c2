use crate::core::model::{Character, PanelImage, StoryPanel};
use crate::services::imagegen::ImageRequest;

const ART_STYLE: &str =
    "Modern digital comic art, vibrant colors, clean lines, dynamic shading, cinematic composition.";

/// Art direction for one panel. Dialogue never reaches the image model: bubbles
/// and captions are laid over the artwork afterwards.
pub fn panel_prompt(character: &Character, panel: &StoryPanel, has_reference: bool) -> String {
    let mut prompt = format!(
        "A comic book panel featuring a character named {name}.\n\
         **Consistent Character Description**: \"{description}\".\n\
         **Art Style**: {style}\n\
         **Scene**: {scene}\n\
         **Character Expression/Action**: {expression}\n",
        name = character.name,
        description = character.description,
        style = ART_STYLE,
        scene = panel.scene.trim(),
        expression = panel.expression.trim(),
    );

    if has_reference {
        prompt.push_str(
            "The attached image is the previous panel of this comic. Keep the character's \
             face, hair, costume and colors identical to it, and keep the same art style.\n",
        );
    }

    prompt
}

pub fn panel_request(
    character: &Character,
    panel: &StoryPanel,
    reference: Option<&PanelImage>,
    aspect_ratio: &str,
) -> ImageRequest {
    ImageRequest {
        prompt: panel_prompt(character, panel, reference.is_some()),
        reference: reference.cloned(),
        aspect_ratio: aspect_ratio.to_string(),
        exclude_text: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::DialogueEntry;

    fn character() -> Character {
        Character {
            name: "Captain Comet".to_string(),
            description: "Silver suit, red scarf, short black hair".to_string(),
        }
    }

    #[test]
    fn test_prompt_includes_character_verbatim_and_panel_text() {
        let panel = StoryPanel::new("A neon city at night", "Grinning, arms crossed");
        let prompt = panel_prompt(&character(), &panel, false);

        assert!(prompt.contains("named Captain Comet"));
        assert!(prompt.contains("\"Silver suit, red scarf, short black hair\""));
        assert!(prompt.contains("**Scene**: A neon city at night"));
        assert!(prompt.contains("**Character Expression/Action**: Grinning, arms crossed"));
        assert!(!prompt.contains("Do not include any text"));
        assert!(!prompt.contains("previous panel"));
    }

    #[test]
    fn test_prompt_excludes_dialogue() {
        let panel = StoryPanel::new("Rooftop", "Shouting")
            .with_dialogue(DialogueEntry::new(Some("Comet".to_string()), "Stop right there!"));
        let prompt = panel_prompt(&character(), &panel, true);

        assert!(!prompt.contains("Stop right there!"));
        assert!(prompt.contains("previous panel"));
    }

    #[test]
    fn test_request_carries_reference() {
        let panel = StoryPanel::new("Rooftop", "Shouting");
        let img = PanelImage::new("image/png", vec![9]);
        let request = panel_request(&character(), &panel, Some(&img), "1:1");

        assert_eq!(request.reference, Some(img));
        assert_eq!(request.aspect_ratio, "1:1");
        assert!(request.exclude_text);
        assert!(request.full_prompt().contains("Do not include any text"));
    }
}
