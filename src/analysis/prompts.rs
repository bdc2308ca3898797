/// Per-category instructions sent with each image
use super::types::CollectionCategory;

const RESPONSE_SHAPE: &str = r#"Respond with JSON only, in this shape:
{
  "metadata": {
    "name": string, "manufacturer": string, "year": number, "category": string,
    "subCategory": string, "condition": string, "value": number (USD),
    "description": string, "rarity": string,
    "additionalMetadata": { <category-specific fields> }
  },
  "confidence": {
    "overall": number, "itemIdentification": number, "manufacturer": number,
    "releaseYear": number, "category": number, "subCategory": number,
    "condition": number, "estimatedValue": number, <one score per additional field>
  }
}
Confidence scores are between 0 and 1. Lower a score whenever you are unsure."#;

fn role(category: CollectionCategory) -> &'static str {
    match category {
        CollectionCategory::Books => {
            "You identify books from photos of their covers and spines. Set category to \
             \"Books\" and use the genre as subCategory. additionalMetadata: author, \
             publisher, isbn, edition, format (hardcover, paperback, ...), pageCount."
        }
        CollectionCategory::Lego => {
            "You identify LEGO sets from photos of boxes or built models. Set manufacturer \
             and category to \"LEGO\" and use the theme as subCategory. additionalMetadata: \
             setNumber, theme, subtheme, pieceCount, minifigures, recommendedAge, \
             boxCondition."
        }
        CollectionCategory::Funko => {
            "You identify Funko Pop! figures from photos of the figure or its box. Set \
             manufacturer to \"Funko\" and category to \"Funko Pop\", and use the license \
             as subCategory. additionalMetadata: popNumber, series, exclusive, variant, \
             boxCondition."
        }
        CollectionCategory::Diecast => {
            "You identify diecast model vehicles. Set category to \"Diecast\" and use the \
             vehicle type as subCategory. additionalMetadata: scale, vehicleMake, \
             vehicleModel, series, color, packaging."
        }
        CollectionCategory::General => {
            "You identify collectible items. additionalMetadata: material, dimensions, \
             packaging, edition, features."
        }
    }
}

/// Full prompt for a category
pub fn prompt_for(category: CollectionCategory) -> String {
    format!("{}\n\n{}", role(category), RESPONSE_SHAPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_a_prompt_with_the_response_shape() {
        for category in CollectionCategory::ALL {
            let prompt = prompt_for(category);
            assert!(prompt.contains("\"confidence\""), "{category}");
            assert!(prompt.contains("additionalMetadata"), "{category}");
        }
        assert!(prompt_for(CollectionCategory::Lego).contains("setNumber"));
    }
}
