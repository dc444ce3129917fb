//! Fixed prompt templates sent to Gemini.
//!
//! The post itself is drafted in Japanese; the image model gets an English
//! visual prompt derived from it.

/// Asks for a tweet about `keyword`: under 140 characters, 1-2 emoji and hashtags.
pub fn tweet_prompt(keyword: &str) -> String {
    format!(
        "キーワード「{}」について、140文字未満で絵文字とハッシュタグを1〜2個含む、創造的で魅力的なツイート本文を作成してください。",
        keyword
    )
}

/// Asks the text model to turn post text into an English visual prompt.
///
/// The post text is embedded verbatim, in its original language.
pub fn translation_prompt(post_text: &str) -> String {
    format!(
        "以下の日本語の文章を、画像生成AIのための視覚的な説明文（ビジュアルプロンプト）にしてください。傑作なアートを描けるように、情景が目に浮かぶような、具体的でクリエイティブな英語の文章でお願いします。返答は、翻訳後の英語プロンプトのみとし、解説や他の言葉は一切含めないでください。\n\n日本語の文章: 「{}」",
        post_text
    )
}

/// Wraps a visual prompt with the image rules: no rendered text or symbols,
/// 1024x1024 square.
pub fn image_prompt(visual_prompt: &str) -> String {
    format!(
        "こんにちは。
以下のテキストのコンセプトを表現する、高品質で芸術的な画像を1枚作成してください。

テキスト: 「{}」

【画像に関する絶対厳守のルール】
- 画像には、いかなる文字、単語、数字、記号も絶対に含めないでください。
- 純粋なグラフィックアートのみを生成してください。
- サイズは1024x1024の正方形でお願いします。

上記の指示に従い、画像と、何か適当なテキスト（例：「作成しました」）を返してください。",
        visual_prompt
    )
}
