#[cfg(test)]
mod tests {
    use crate::runner::catalog::{
        sort_options, AttributeField, AttributeSchema, CatalogSource, FileCatalog, OptionRow,
        ProductRow, RawRule,
    };
    use crate::runner::error::RuleError;
    use serde_json::json;

    fn product(value: serde_json::Value) -> ProductRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_raw_rule_accepts_then_that_alias() {
        let raw: RawRule = serde_json::from_value(json!({
            "id": 3,
            "priority": "10",
            "if_this": {"field": "frame_color", "value": 7},
            "then_that": {"mirror_styles": "disable"}
        }))
        .unwrap();
        assert_eq!(raw.than_that, json!({"mirror_styles": "disable"}));
        assert!(raw.name.is_none());
    }

    #[test]
    fn test_product_attribute_ids_shapes() {
        let row = product(json!({
            "id": 1,
            "product_line": 2,
            "active": true,
            "frame_color": 7,
            "size": {"id": 24},
            "finish": "3",
            "accessories": [1, {"key": 4}],
            "mounting": null
        }));

        assert_eq!(row.attribute_ids("frame_color"), vec![7]);
        assert_eq!(row.attribute_ids("size"), vec![24]);
        assert_eq!(row.attribute_ids("finish"), vec![3]);
        assert_eq!(row.attribute_ids("accessories"), vec![1, 4]);
        assert!(row.attribute_ids("mounting").is_empty());
        assert!(row.attribute_ids("missing").is_empty());
    }

    #[test]
    fn test_product_belongs_to_requires_active() {
        let active = product(json!({"product_line": {"id": 2}, "active": true}));
        let inactive = product(json!({"product_line": 2}));
        assert!(active.belongs_to(2));
        assert!(!active.belongs_to(3));
        assert!(!inactive.belongs_to(2));
    }

    #[test]
    fn test_sort_options_by_sort_then_name() {
        let mut options = vec![
            OptionRow::new(1, "Walnut"),
            OptionRow {
                sort: Some(2),
                ..OptionRow::new(2, "Oak")
            },
            OptionRow::new(3, "Ash"),
            OptionRow {
                sort: Some(1),
                ..OptionRow::new(4, "Pine")
            },
        ];
        sort_options(&mut options);
        let ids: Vec<i64> = options.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_schema_resolves_field_or_collection() {
        let schema = AttributeSchema::new(vec![
            AttributeField::new("frame_color", "frame_colors"),
            AttributeField::new("mirror_style", "mirror_styles").protected(),
        ]);
        assert_eq!(schema.resolve("frame_colors").map(|f| f.field.as_str()), Some("frame_color"));
        assert!(schema.resolve("mirror_style").is_some_and(|f| f.protected));
        assert!(schema.resolve("size").is_none());
        assert_eq!(schema.collections(), vec!["frame_colors", "mirror_styles"]);
        assert_eq!(schema.fields[0].column(), "frame_color");
    }

    #[test]
    fn test_schema_deserializes_from_list() {
        let schema: AttributeSchema = serde_json::from_value(json!([
            {"field": "mounting", "collection": "mounting_options", "product_column": "mounting_option"}
        ]))
        .unwrap();
        assert_eq!(schema.fields[0].column(), "mounting_option");
        assert!(!schema.fields[0].protected);
    }

    #[tokio::test]
    async fn test_file_catalog_fetches() {
        let catalog = FileCatalog::from_json(
            r#"{
                "rules": [{"id": 1, "if_this": {}, "than_that": {}}],
                "products": [
                    {"id": 1, "product_line": 2, "active": true, "frame_color": 7},
                    {"id": 2, "product_line": 5, "active": true, "frame_color": 8}
                ],
                "collections": {"frame_colors": [{"id": 7, "name": "Black"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.fetch_rules().await.unwrap().len(), 1);
        assert_eq!(catalog.fetch_products(2).await.unwrap().len(), 1);
        let colors = catalog.fetch_option_collection("frame_colors").await.unwrap();
        assert_eq!(colors[0].name, "Black");
        assert!(colors[0].active);
        assert!(catalog.collection_exists("frame_colors").await.unwrap());
        assert!(!catalog.collection_exists("sizes").await.unwrap());
        assert!(matches!(
            catalog.fetch_option_collection("sizes").await,
            Err(RuleError::Collaborator(_))
        ));
    }

    #[test]
    fn test_file_catalog_rejects_invalid_json() {
        assert!(matches!(
            FileCatalog::from_json("{ not json"),
            Err(RuleError::JsonError(_))
        ));
    }
}
